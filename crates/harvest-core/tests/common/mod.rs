#![allow(dead_code)]

pub mod route_server;
