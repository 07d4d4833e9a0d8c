//! Every rejected operation fails with its own error and produces nothing

use fedavg_he::protocol::encrypt_weights;
use fedavg_he::{
    aggregate, decrypt_result, generate_keypair_seeded, AggregationMode, CkksBackend, CkksParams,
    CryptoContext, FedError, PlainBackend, SampleCount, SiteCiphertext, WeightVector,
};

fn small_ckks() -> CryptoContext<CkksBackend> {
    CryptoContext::from_params(CkksParams::new(4096, vec![50, 30, 29], 40)).unwrap()
}

fn plain() -> CryptoContext<PlainBackend> {
    CryptoContext::from_params(CkksParams::fedavg_n8192()).unwrap()
}

fn w(v: f64) -> WeightVector {
    WeightVector::new([v, v, v, v, v]).unwrap()
}

fn plain_sites(counts: &[Option<f64>]) -> Vec<SiteCiphertext<PlainBackend>> {
    let ctx = plain();
    let (pk, _) = generate_keypair_seeded(&ctx, 1).unwrap();
    counts
        .iter()
        .map(|c| encrypt_weights(&ctx, &pk, &w(1.0), c.map(SampleCount)).unwrap())
        .collect()
}

#[test]
fn test_empty_input() {
    let ctx = plain();
    for mode in [AggregationMode::Simple, AggregationMode::Weighted] {
        assert!(matches!(
            aggregate(&ctx, mode, &[]),
            Err(FedError::EmptyInput)
        ));
    }
}

#[test]
fn test_missing_count_in_weighted_mode() {
    let ctx = plain();
    let sites = plain_sites(&[Some(10.0), None, Some(5.0)]);
    assert!(matches!(
        aggregate(&ctx, AggregationMode::Weighted, &sites),
        Err(FedError::MissingWeight { index: 1 })
    ));
    // counts are ignored in simple mode
    assert!(aggregate(&ctx, AggregationMode::Simple, &sites).is_ok());
}

#[test]
fn test_non_positive_counts() {
    let ctx = plain();
    for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
        let sites = plain_sites(&[Some(10.0), Some(bad)]);
        match aggregate(&ctx, AggregationMode::Weighted, &sites) {
            Err(FedError::InvalidWeight { index: 1, .. }) => {}
            other => panic!("count {bad}: unexpected {other:?}"),
        }
    }
}

#[test]
fn test_count_total_overflow() {
    let ctx = plain();
    let sites = plain_sites(&[Some(1e308), Some(1e308)]);
    match aggregate(&ctx, AggregationMode::Weighted, &sites) {
        Err(FedError::InvalidWeight { index: 1, count }) => assert_eq!(count, 1e308),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_invalid_mode_literals() {
    for s in ["", "Simple", "WEIGHTED", "mean", "weighted ", "avg"] {
        assert!(matches!(
            s.parse::<AggregationMode>(),
            Err(FedError::InvalidMode(ref m)) if m == s
        ));
    }
    assert_eq!(
        "simple".parse::<AggregationMode>().unwrap(),
        AggregationMode::Simple
    );
    assert_eq!(
        "weighted".parse::<AggregationMode>().unwrap(),
        AggregationMode::Weighted
    );
}

#[test]
fn test_mixed_keys_rejected() {
    let ctx = small_ckks();
    let (pk_a, _) = generate_keypair_seeded(&ctx, 1).unwrap();
    let (pk_b, _) = generate_keypair_seeded(&ctx, 2).unwrap();
    let a = encrypt_weights(&ctx, &pk_a, &w(0.1), None).unwrap();
    let b = encrypt_weights(&ctx, &pk_b, &w(0.2), None).unwrap();

    assert!(matches!(
        aggregate(&ctx, AggregationMode::Simple, &[a, b]),
        Err(FedError::ContextMismatch(_))
    ));
}

#[test]
fn test_mixed_contexts_rejected() {
    let ctx_a = small_ckks();
    let ctx_b =
        CryptoContext::<CkksBackend>::from_params(CkksParams::new(4096, vec![50, 30, 28], 40))
            .unwrap();
    assert_ne!(ctx_a.fingerprint(), ctx_b.fingerprint());

    let (pk_a, custodian_a) = generate_keypair_seeded(&ctx_a, 1).unwrap();
    let (pk_b, _) = generate_keypair_seeded(&ctx_b, 1).unwrap();

    assert!(matches!(
        encrypt_weights(&ctx_a, &pk_b, &w(0.1), None),
        Err(FedError::ContextMismatch(_))
    ));

    let foreign = encrypt_weights(&ctx_b, &pk_b, &w(0.1), None).unwrap();
    assert!(matches!(
        aggregate(&ctx_a, AggregationMode::Simple, &[foreign.clone()]),
        Err(FedError::ContextMismatch(_))
    ));

    let (agg_b, _) = aggregate(&ctx_b, AggregationMode::Simple, &[foreign]).unwrap();
    assert!(matches!(
        decrypt_result(&ctx_a, &custodian_a, &agg_b),
        Err(FedError::ContextMismatch(_))
    ));

    let own = encrypt_weights(&ctx_a, &pk_a, &w(0.1), None).unwrap();
    let (agg_a, _) = aggregate(&ctx_a, AggregationMode::Simple, &[own]).unwrap();
    assert!(decrypt_result(&ctx_a, &custodian_a, &agg_a).is_ok());
}

#[test]
fn test_wrong_custodian_rejected() {
    let ctx = small_ckks();
    let (pk, _) = generate_keypair_seeded(&ctx, 1).unwrap();
    let (_, other) = generate_keypair_seeded(&ctx, 2).unwrap();
    let site = encrypt_weights(&ctx, &pk, &w(0.3), None).unwrap();
    let (agg, _) = aggregate(&ctx, AggregationMode::Simple, &[site]).unwrap();
    assert!(matches!(
        decrypt_result(&ctx, &other, &agg),
        Err(FedError::ContextMismatch(_))
    ));
}

#[test]
fn test_depth_exhausted_input_rejected() {
    let ctx = CryptoContext::<CkksBackend>::from_params(CkksParams::new(4096, vec![60, 40], 40))
        .unwrap();
    assert_eq!(ctx.fresh_level(), 1);
    let (pk, custodian) = generate_keypair_seeded(&ctx, 5).unwrap();

    let sites: Vec<_> = [0.25, 0.75]
        .iter()
        .map(|&v| encrypt_weights(&ctx, &pk, &w(v), Some(SampleCount(1.0))).unwrap())
        .collect();
    let (agg, _) = aggregate(&ctx, AggregationMode::Simple, &sites).unwrap();
    assert_eq!(agg.level(&ctx), 0);
    let result = decrypt_result(&ctx, &custodian, &agg).unwrap();
    for v in result.weights {
        assert!((v - 0.5).abs() < 1e-6);
    }

    // an aggregate cannot be averaged again
    let spent = SiteCiphertext {
        ciphertext: agg,
        count: Some(SampleCount(1.0)),
    };
    for mode in [AggregationMode::Simple, AggregationMode::Weighted] {
        assert!(matches!(
            aggregate(&ctx, mode, &[spent.clone(), sites[0].clone()]),
            Err(FedError::NoiseBudgetExhausted(_))
        ));
    }
}

#[test]
fn test_invalid_parameters() {
    for params in [
        CkksParams::new(3000, vec![60, 40], 40),
        CkksParams::new(8192, vec![60], 40),
        CkksParams::new(1024, vec![60, 40, 40, 60], 40),
        CkksParams::new(8192, vec![45, 40], 40),
        CkksParams::new(8192, vec![60, 61], 40),
    ] {
        assert!(matches!(
            CryptoContext::<CkksBackend>::from_params(params),
            Err(FedError::Config(_))
        ));
    }
}

#[test]
fn test_out_of_range_values_rejected() {
    let ctx = small_ckks();
    let (pk, _) = generate_keypair_seeded(&ctx, 1).unwrap();
    let huge = WeightVector::new([1e12, 0.0, 0.0, 0.0, 0.0]).unwrap();
    assert!(matches!(
        encrypt_weights(&ctx, &pk, &huge, None),
        Err(FedError::Schema(_))
    ));
}
