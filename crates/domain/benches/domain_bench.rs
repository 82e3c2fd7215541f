use common::PaymentIntentId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{BillingAddress, IntentStatus, Metadata, PaymentIntent, classify, merge};

fn checkout_metadata(extra_keys: usize) -> Metadata {
    let mut metadata = Metadata::from([
        ("funnel_type".to_string(), "membership".to_string()),
        ("customer_email".to_string(), "a@b.com".to_string()),
        ("add_ons".to_string(), "workbook,replay".to_string()),
    ]);
    for i in 0..extra_keys {
        metadata.insert(format!("utm_{i}"), format!("value_{i}"));
    }
    metadata
}

fn bench_merge_billing_patch(c: &mut Criterion) {
    let current = checkout_metadata(20);
    let patch = BillingAddress {
        line1: "1 Main St".to_string(),
        city: "LA".to_string(),
        country: "US".to_string(),
        ..Default::default()
    }
    .to_metadata_patch();

    c.bench_function("domain/merge_billing_patch", |b| {
        b.iter(|| merge(std::hint::black_box(&current), std::hint::black_box(&patch)));
    });
}

fn bench_classify(c: &mut Criterion) {
    let intent = PaymentIntent {
        id: PaymentIntentId::parse("pi_bench").unwrap(),
        status: IntentStatus::Succeeded,
        amount: 4900,
        currency: "usd".to_string(),
        metadata: checkout_metadata(5),
        client_secret: None,
    };

    c.bench_function("domain/classify", |b| {
        b.iter(|| classify(std::hint::black_box(&intent)));
    });
}

criterion_group!(benches, bench_merge_billing_patch, bench_classify);
criterion_main!(benches);
