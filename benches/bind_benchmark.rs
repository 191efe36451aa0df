//! Binding benchmarks against the sales model used by the tests.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use odata_query::{BindingContext, ProtocolVersion, UriQueryParser};

#[path = "../tests/common/mod.rs"]
mod common;

fn bench_bind_filter(c: &mut Criterion) {
    let model = common::sales_model();
    let parser = UriQueryParser::new(&model);
    let products = BindingContext::for_entity_set(&model, "Products");
    let customers = BindingContext::for_entity_set(&model, "Customers");

    let mut group = c.benchmark_group("bind_filter");
    group.bench_function("comparison", |b| {
        b.iter(|| parser.parse_filter(black_box("Price gt 10 and Name ne 'x'"), &products).unwrap());
    });
    group.bench_function("promotion", |b| {
        b.iter(|| parser.parse_filter(black_box("ID add 1.5 gt 2 and Weight lt 3"), &products).unwrap());
    });
    group.bench_function("builtins", |b| {
        b.iter(|| {
            parser
                .parse_filter(black_box("contains(tolower(Name),'w') and year(Released) eq 2024"), &products)
                .unwrap()
        });
    });
    group.bench_function("lambda", |b| {
        b.iter(|| {
            parser
                .parse_filter(black_box("Orders/any(o:o/Items/all(i:i/Quantity gt 0))"), &customers)
                .unwrap()
        });
    });
    group.finish();
}

fn bench_bind_expand_depth(c: &mut Criterion) {
    let model = common::sales_model();
    let parser = UriQueryParser::new(&model);
    let employees = BindingContext::for_entity_set(&model, "Employees");

    let mut group = c.benchmark_group("bind_expand");
    for depth in [1, 4, 8] {
        let text = (0..depth).fold(String::new(), |inner, _| {
            if inner.is_empty() {
                "Reports".to_string()
            } else {
                format!("Reports($expand={inner})")
            }
        });
        group.bench_with_input(BenchmarkId::new("nested", depth), &text, |b, text| {
            b.iter(|| parser.parse_select_and_expand(None, Some(black_box(text.as_str())), &employees).unwrap());
        });
    }
    group.finish();
}

fn bench_parse_uri(c: &mut Criterion) {
    let model = common::sales_model();
    let parser = UriQueryParser::new(&model);
    let uri = "Customers('A')/Orders?$filter=Amount gt @min&$orderby=Placed desc&$expand=Items($select=Quantity)&$top=10&@min=100";

    c.bench_function("parse_uri", |b| {
        b.iter(|| parser.parse_uri(black_box(uri)).unwrap());
    });

    c.bench_function("parse_uri_resolve_aliases", |b| {
        b.iter(|| {
            parser
                .parse_uri(black_box(uri))
                .unwrap()
                .resolve_aliases(ProtocolVersion::V4)
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_bind_filter, bench_bind_expand_depth, bench_parse_uri);
criterion_main!(benches);
