//! Domain services used by the websocket surface.
//!
//! ARCHITECTURE
//! ============
//! Service modules own coordination logic over the storage boundary so the
//! session controller and route handlers stay focused on orchestration and
//! protocol translation.

pub mod conversation;
