#![allow(dead_code)]

pub mod fetcher;
pub mod media_handler;
pub mod portal;
