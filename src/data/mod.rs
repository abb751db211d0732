/// Data layer: binary decoding, correction tables and the output dataset.
///
/// Architecture:
/// ```text
///   .mpl byte stream          afterpulse / overlap / dead-time files
///        │                                  │
///        ▼                                  ▼
///   ┌──────────┐                     ┌────────────┐
///   │  record   │  header + channels  │ correction  │  immutable tables
///   └──────────┘                     └────────────┘
///        │                                  │
///        ▼                                  │
///   ┌───────────┐                           │
///   │ aggregate  │  stack → Dataset ◄────────┘ merge
///   └───────────┘
///        │
///        ▼
///     crate::nrb  →  crate::output
/// ```

pub mod aggregate;
pub mod correction;
pub mod header;
pub mod loader;
pub mod meta;
pub mod model;
pub mod record;
