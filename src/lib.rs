//! # acdbot
//!
//! Automation for protocol-call coordination.
//!
//! ## Architecture
//!
//! - **schedule**: Extract a call's start time and duration from an issue body
//! - **clients**: GitHub, Zoom, Discourse, Google Calendar, Telegram and YouTube
//! - **storage**: The meeting ↔ topic mapping document
//! - **workflow**: Issue handling, transcript posting and recording uploads
//! - **config**: Configuration loading and validation

pub mod clients;
pub mod config;
pub mod schedule;
pub mod storage;
pub mod workflow;

pub use schedule::{parse_schedule, ParsedSchedule, ScheduleError, ScheduleErrorKind};
