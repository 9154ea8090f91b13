//! Kiln Bake - turns interface and class declarations into runnable types.
//!
//! A [`Bakery`] owns a frozen [`TypeRegistry`](kiln_types::TypeRegistry)
//! and a [`BakeryConfig`]. Asking it for a type runs two passes:
//!
//! - [`analyze`]: walk the interface closure (and the class chain), map
//!   every member to what implements it, and plan a generator per member;
//! - [`build`]: allocate fields, synthesize accessor bodies (direct
//!   delegation, mix-in forwarding, or the wrapping protocol), emit the
//!   constructor, and verify the result.
//!
//! Baked types are cached per source type; [`Bakery::create`] instantiates
//! them.

mod analyze;
mod bakery;
mod build;
mod config;
mod plan;
mod shared;

use std::sync::Once;

pub use analyze::{analyze, Analysis};
pub use bakery::Bakery;
pub use build::build;
pub use config::{BakeryConfig, DefaultValueProvider, StandardDefaults};
pub use plan::{Generator, MemberDecl, MemberKind, MemberPlan};
pub use shared::SharedRegistry;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=kiln_bake=debug` or `RUST_LOG=kiln_eval=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
