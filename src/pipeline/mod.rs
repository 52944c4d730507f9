//! Pipeline stages for turning agency reports into enrollment records.
//!
//! Each submodule implements exactly one step. Parsing stages are pure
//! functions over page text; only [`input`] and [`extract`] touch the
//! outside world.
//!
//! ## Data Flow
//!
//! ```text
//! resolve ──▶ input ──▶ extract ──▶ detect ──▶ legacy | modern
//!  (URLs)    (fetch)    (pdfium)   (layout)    (county rows)
//!                                                   │
//!  tag ◀── tidy ◀── aggregate ◀── reconcile ◀───────┘
//!                                  ▲
//!                 headcount ───────┘
//! ```
//!
//! 1. [`resolve`]: ordered candidate URLs for a (year, kind)
//! 2. [`input`]: try candidates until one is a plausible PDF
//! 3. [`extract`]: text layer, one string per page; runs in
//!    `spawn_blocking` because pdfium is blocking
//! 4. [`detect`]: legacy or split-page layout, by content
//! 5. [`legacy`] / [`modern`]: county rows, via [`tokens`]
//! 6. [`headcount`]: headcount totals by county
//! 7. [`reconcile`]: headcount overrides row totals; identity synthesized
//! 8. [`aggregate`]: synthetic state row
//! 9. [`tidy`]: long rows with grade bands
//! 10. [`tag`]: aggregation flags from identifier fields

pub mod aggregate;
pub mod detect;
pub mod extract;
pub mod headcount;
pub mod input;
pub mod legacy;
pub mod modern;
pub mod reconcile;
pub mod resolve;
pub mod tag;
pub mod tidy;
pub mod tokens;
