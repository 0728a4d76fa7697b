//! XPath and CSS selector matchers for HTML response bodies.
//!
//! ```ignore
//! use have_xpath::{have_xpath, Should};
//!
//! body.should(have_xpath("//div").class("inner").content("hello"))?;
//! body.should(have_xpath("//div[@id='main']").inspect(|main| {
//!     main.should(have_xpath("//li").content("Second"))
//! }))?;
//! ```

pub mod errors;
pub mod dom;
pub mod xpath;
pub mod functions; // plugin model
pub mod constraints;
pub mod engine;
pub mod context;
pub mod matchers;
pub mod selector;
pub mod assertions;
mod parser;
mod filter;
mod comparison;

pub use assertions::{expect_eq, Assertions, DefaultFactory, MatcherFactory};
pub use constraints::Constraints;
pub use context::{Context, DocumentSource};
pub use dom::{Document, NodeRef, NodeSet};
pub use engine::{evaluate, evaluate_in, evaluate_within, Evaluator, MatchResult};
pub use errors::{AssertError, Mismatch, QueryError};
pub use matchers::{expect_match, expect_no_match, have_xpath, AsSubject, HaveXpath, Matcher, Should, Subject};
pub use selector::{have_selector, HaveSelector};
