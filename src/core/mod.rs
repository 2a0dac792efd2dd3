// Core module - Communication engine and session lifecycle
pub mod communication;
