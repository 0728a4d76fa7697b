use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::errors::{QueryError, Result};
use crate::xpath::{EvalCtx, XValue};

/// Trait for pluggable functions callable from XPath predicates.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> RangeInclusive<usize>;
    fn call<'d>(&self, ctx: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>>;
}

/// Thread-safe function registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<&'static str, Arc<dyn Function>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtins::Position);
        registry.register(builtins::Last);
        registry.register(builtins::Count);
        registry.register(builtins::Not);
        registry.register(builtins::True);
        registry.register(builtins::False);
        registry.register(builtins::StringFn);
        registry.register(builtins::Concat);
        registry.register(builtins::Contains);
        registry.register(builtins::StartsWith);
        registry.register(builtins::NormalizeSpace);
        registry.register(builtins::StringLength);
        registry.register(builtins::Name);
        registry.register(builtins::LocalName);
        registry
    }

    pub fn register<F: Function + 'static>(&mut self, f: F) {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(f.name(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.inner.get(name).cloned()
    }

    /// Look up `name` and verify it accepts `argc` arguments.
    pub fn check(&self, name: &str, argc: usize) -> Result<Arc<dyn Function>> {
        let f = self
            .get(name)
            .ok_or_else(|| QueryError::UnknownFunction(name.to_string()))?;
        let arity = f.arity();
        if !arity.contains(&argc) {
            let expected = match (arity.start(), arity.end()) {
                (lo, hi) if lo == hi => lo.to_string(),
                (lo, &usize::MAX) => format!("at least {lo}"),
                (lo, hi) => format!("{lo} to {hi}"),
            };
            return Err(QueryError::Arity {
                name: name.to_string(),
                expected,
                got: argc,
            });
        }
        Ok(f)
    }
}

pub mod builtins {
    use super::*;
    use crate::dom::NodeRef;

    // string-value of the single argument, or of the context node when omitted
    fn string_arg(ctx: &EvalCtx<'_, '_>, args: &[XValue<'_>]) -> String {
        match args.first() {
            Some(v) => v.to_string_value(),
            None => ctx.node.text(),
        }
    }

    fn string_at(args: &[XValue<'_>], i: usize) -> String {
        args.get(i).map(XValue::to_string_value).unwrap_or_default()
    }

    pub struct Position;
    impl Function for Position {
        fn name(&self) -> &'static str { "position" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=0 }
        fn call<'d>(&self, ctx: &EvalCtx<'d, '_>, _: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Num(ctx.position as f64))
        }
    }

    pub struct Last;
    impl Function for Last {
        fn name(&self) -> &'static str { "last" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=0 }
        fn call<'d>(&self, ctx: &EvalCtx<'d, '_>, _: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Num(ctx.size as f64))
        }
    }

    pub struct Count;
    impl Function for Count {
        fn name(&self) -> &'static str { "count" }
        fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
        fn call<'d>(&self, _: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            let n = args
                .first()
                .and_then(XValue::node_strings)
                .map(|members| members.len())
                .unwrap_or(0);
            Ok(XValue::Num(n as f64))
        }
    }

    pub struct Not;
    impl Function for Not {
        fn name(&self) -> &'static str { "not" }
        fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
        fn call<'d>(&self, _: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Bool(!args.first().is_some_and(XValue::to_bool)))
        }
    }

    pub struct True;
    impl Function for True {
        fn name(&self) -> &'static str { "true" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=0 }
        fn call<'d>(&self, _: &EvalCtx<'d, '_>, _: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Bool(true))
        }
    }

    pub struct False;
    impl Function for False {
        fn name(&self) -> &'static str { "false" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=0 }
        fn call<'d>(&self, _: &EvalCtx<'d, '_>, _: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Bool(false))
        }
    }

    pub struct StringFn;
    impl Function for StringFn {
        fn name(&self) -> &'static str { "string" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=1 }
        fn call<'d>(&self, ctx: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Str(string_arg(ctx, &args)))
        }
    }

    pub struct Concat;
    impl Function for Concat {
        fn name(&self) -> &'static str { "concat" }
        fn arity(&self) -> RangeInclusive<usize> { 2..=usize::MAX }
        fn call<'d>(&self, _: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Str(args.iter().map(XValue::to_string_value).collect()))
        }
    }

    pub struct Contains;
    impl Function for Contains {
        fn name(&self) -> &'static str { "contains" }
        fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
        fn call<'d>(&self, _: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Bool(string_at(&args, 0).contains(&string_at(&args, 1))))
        }
    }

    pub struct StartsWith;
    impl Function for StartsWith {
        fn name(&self) -> &'static str { "starts-with" }
        fn arity(&self) -> RangeInclusive<usize> { 2..=2 }
        fn call<'d>(&self, _: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Bool(string_at(&args, 0).starts_with(&string_at(&args, 1))))
        }
    }

    pub struct NormalizeSpace;
    impl Function for NormalizeSpace {
        fn name(&self) -> &'static str { "normalize-space" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=1 }
        fn call<'d>(&self, ctx: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            let s = string_arg(ctx, &args);
            Ok(XValue::Str(s.split_whitespace().collect::<Vec<_>>().join(" ")))
        }
    }

    pub struct StringLength;
    impl Function for StringLength {
        fn name(&self) -> &'static str { "string-length" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=1 }
        fn call<'d>(&self, ctx: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Num(string_arg(ctx, &args).chars().count() as f64))
        }
    }

    // name of the first member of a node-set argument, or of the context node
    fn first_name<'d>(ctx: &EvalCtx<'d, '_>, args: &[XValue<'d>]) -> String {
        match args.first() {
            None => ctx.node.name().unwrap_or_default().to_string(),
            Some(XValue::Nodes(ns)) => ns
                .first()
                .and_then(NodeRef::name)
                .unwrap_or_default()
                .to_string(),
            Some(XValue::Attrs(attrs)) => attrs.first().map(|a| a.name).unwrap_or_default().to_string(),
            Some(_) => String::new(),
        }
    }

    pub struct Name;
    impl Function for Name {
        fn name(&self) -> &'static str { "name" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=1 }
        fn call<'d>(&self, ctx: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            Ok(XValue::Str(first_name(ctx, &args)))
        }
    }

    pub struct LocalName;
    impl Function for LocalName {
        fn name(&self) -> &'static str { "local-name" }
        fn arity(&self) -> RangeInclusive<usize> { 0..=1 }
        fn call<'d>(&self, ctx: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
            let name = first_name(ctx, &args);
            let local = name.rsplit(':').next().unwrap_or_default().to_string();
            Ok(XValue::Str(local))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use pretty_assertions::assert_eq;

    #[test]
    fn arity_is_checked() {
        let registry = Registry::with_builtins();
        assert!(registry.check("contains", 2).is_ok());
        assert_eq!(
            registry.check("contains", 1).err(),
            Some(QueryError::Arity {
                name: "contains".into(),
                expected: "2".into(),
                got: 1,
            })
        );
        assert_eq!(
            registry.check("concat", 1).err().map(|e| e.to_string()),
            Some("xpath function `concat()` takes at least 2 argument(s), got 1".into())
        );
    }

    #[test]
    fn custom_functions_can_be_registered() {
        struct Upper;
        impl Function for Upper {
            fn name(&self) -> &'static str { "upper-case" }
            fn arity(&self) -> RangeInclusive<usize> { 1..=1 }
            fn call<'d>(&self, _: &EvalCtx<'d, '_>, args: Vec<XValue<'d>>) -> Result<XValue<'d>> {
                Ok(XValue::Str(args[0].to_string_value().to_uppercase()))
            }
        }

        let mut registry = Registry::with_builtins();
        registry.register(Upper);
        let doc = Document::parse("<p>loud</p><p>quiet</p>");
        let hits = crate::xpath::parse("//p[upper-case(.) = 'LOUD']")
            .unwrap()
            .select(doc.root(), &registry)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(Registry::with_builtins().get("upper-case").is_none());
    }

    #[test]
    fn normalize_space_collapses_runs() {
        let registry = Registry::with_builtins();
        let doc = Document::parse("<p>  a \n  b </p>");
        let hits = crate::xpath::parse("//p[normalize-space() = 'a b']")
            .unwrap()
            .select(doc.root(), &registry)
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
