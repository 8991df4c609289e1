//! `nav-follow`: tracking a moving agent against the active route.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                        |
//! |-------------|-----------------------------------------------------------------|
//! | [`fix`]     | `LocationFix`, one position report                              |
//! | [`matcher`] | `RouteMatcher`, `MatchResult`, `TurnAhead`, `DeviationTracker`  |
//!
//! The matcher holds no route; callers pass the current `Route` on every
//! call and reset the matcher when they replace it.

pub mod fix;
pub mod matcher;


pub use fix::LocationFix;
pub use matcher::{DeviationTracker, MatchResult, RouteMatcher, TurnAhead, MATCH_LOOKAHEAD_SEGMENTS};
