//! The command language.
//!
//! Text is turned into [`token::Token`]s by the [`lexer`], and statements are
//! reduced by the evaluator in [`eval`] against the command [`registry`].
//! Arguments are matched to command parameters by the [`binder`] using the
//! type descriptors in [`types`].
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use simline::config::Settings;
//! use simline::host::{BufferOutput, StaticHost};
//! use simline::script::interp::Interp;
//! use simline::script::value::Value;
//!
//! let mut i = Interp::new(Arc::new(StaticHost::new()), Settings::default(), Box::new(BufferOutput::new())).unwrap();
//! assert_eq!(i.run("$x = 6; $x * 7").unwrap(), Value::Int(42));
//! ```

pub mod binder;
pub mod builtins;
pub mod complete;
pub mod eval;
pub mod interp;
pub mod lexer;
pub mod registry;
pub mod token;
pub mod types;
pub mod value;

pub use interp::{Interp, Report};
pub use registry::{Arg, Command, Reply};
pub use value::Value;
