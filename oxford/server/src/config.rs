use serde::Deserialize;
use std::path::PathBuf;

/// Where rows and identities live.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Supabase,
    /// In-process tables and one configured account.
    Memory,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    pub jwt_secret: String,
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    /// Restricts house scoped pages to this house.
    #[serde(default)]
    pub house_id: Option<String>,
}

/// Validated connection settings for the chosen storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Supabase { url: String, anon_key: String },
    Memory { admin_email: String, admin_password: String },
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Checks that the chosen backend has everything it needs.
    pub fn backend(&self) -> anyhow::Result<Backend> {
        match self.storage {
            StorageBackend::Supabase => {
                let (Some(url), Some(anon_key)) = (&self.supabase_url, &self.supabase_anon_key)
                else {
                    anyhow::bail!("STORAGE=supabase needs SUPABASE_URL and SUPABASE_ANON_KEY");
                };
                Ok(Backend::Supabase {
                    url: url.clone(),
                    anon_key: anon_key.clone(),
                })
            }
            StorageBackend::Memory => {
                let (Some(admin_email), Some(admin_password)) =
                    (&self.admin_email, &self.admin_password)
                else {
                    anyhow::bail!("STORAGE=memory needs ADMIN_EMAIL and ADMIN_PASSWORD");
                };
                Ok(Backend::Memory {
                    admin_email: admin_email.clone(),
                    admin_password: admin_password.clone(),
                })
            }
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("public/docs")
}
