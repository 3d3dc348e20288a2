#![allow(dead_code)]
use std::path::Path;

use py2c::ast::Module;
use py2c::parser;
use test_support::load_cases;

/// Fixture programs tagged for benchmarking, as `(label, source)` pairs.
pub fn workloads(tag: &str) -> Vec<(String, String)> {
    let cases = load_cases(Path::new("tests/programs")).expect("load fixture cases");
    cases
        .into_iter()
        .filter(|case| case.spec.bench.enabled && case.spec.bench.tags.iter().any(|t| t == tag))
        .map(|case| {
            let source = case.read_program().expect("read fixture program");
            (case.name, source)
        })
        .collect()
}

pub fn load_module(source: &str) -> Module {
    parser::parse(source).unwrap_or_else(|err| panic!("parse: {err}"))
}
