use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xylem::{parse_bytes, parse_str, parse_str_with_options, ParseOptions};

fn sample_document(items: usize) -> String {
    let mut doc = String::from(
        "<?xml version=\"1.0\"?>\
         <!DOCTYPE catalog [<!ENTITY vendor \"Acme Corp\">]>\
         <catalog xmlns=\"urn:catalog\" xmlns:m=\"urn:meta\">",
    );
    for i in 0..items {
        doc.push_str(&format!(
            "<item id=\"i{i}\" m:rank=\"{r}\">\
             <name>Item {i} &amp; co</name>\
             <vendor>&vendor;</vendor>\
             <!-- batch {b} -->\
             <desc><![CDATA[raw <data> #{i}]]></desc>\
             </item>",
            r = i % 7,
            b = i / 100,
        ));
    }
    doc.push_str("</catalog>");
    doc
}

fn bench_parse(c: &mut Criterion) {
    let small = sample_document(10);
    let large = sample_document(1_000);
    let large_bytes = large.as_bytes().to_vec();

    c.bench_function("parse_small", |b| {
        b.iter(|| parse_str(black_box(&small)).unwrap());
    });
    c.bench_function("parse_large", |b| {
        b.iter(|| parse_str(black_box(&large)).unwrap());
    });
    c.bench_function("parse_large_bytes", |b| {
        b.iter(|| parse_bytes(black_box(&large_bytes)).unwrap());
    });
}

fn bench_tidy(c: &mut Criterion) {
    let mut sloppy = String::from("<!doctype List><LIST>");
    for i in 0..500 {
        sloppy.push_str(&format!("<Item Id={i} selected>entry {i}<br></ITEM>"));
    }
    sloppy.push_str("</list>");

    c.bench_function("parse_tidy", |b| {
        b.iter(|| {
            parse_str_with_options(black_box(&sloppy), ParseOptions::new().tidy(true)).unwrap()
        });
    });
}

criterion_group!(benches, bench_parse, bench_tidy);
criterion_main!(benches);
