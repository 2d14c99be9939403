pub mod auth;
pub mod config;
pub mod docs;
pub mod form;
pub mod page;
pub mod pdf;
pub mod realtime;
pub mod remote;
pub mod resource;
pub mod routes;
pub mod session;
pub mod web;
