//! End-to-end correctness of the aggregation protocol over real CKKS
//!
//! Keygen → Encrypt (per site) → Aggregate → Decrypt ≈ plaintext mean

use fedavg_he::protocol::{encrypt_sites_seeded, encrypt_with_rng};
use fedavg_he::{
    aggregate, decrypt_result, generate_keypair_seeded, AggregationMode, CkksParams,
    CryptoContext, FederatedRound, KeyCustodian, PublicKey, SampleCount, SiteCiphertext, Stage,
    WeightVector,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

const SITE_A: [f64; 5] = [0.10, 0.20, 0.30, 0.40, 0.05];
const SITE_B: [f64; 5] = [0.15, 0.18, 0.25, 0.42, 0.07];

fn setup() -> (CryptoContext, PublicKey, KeyCustodian) {
    let ctx = CryptoContext::from_params(CkksParams::fedavg_n8192()).unwrap();
    let (pk, custodian) = generate_keypair_seeded(&ctx, 7).unwrap();
    (ctx, pk, custodian)
}

fn w(values: [f64; 5]) -> WeightVector {
    WeightVector::new(values).unwrap()
}

fn assert_close(actual: &[f64; 5], expected: &[f64; 5], tol: f64) {
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < tol, "slot {i}: got {a}, expected {e}");
    }
}

fn run(
    ctx: &CryptoContext,
    pk: &PublicKey,
    custodian: &KeyCustodian,
    mode: AggregationMode,
    sites: &[(WeightVector, Option<SampleCount>)],
) -> [f64; 5] {
    let encrypted = encrypt_sites_seeded(ctx, pk, sites, 11).unwrap();
    let (aggregated, _) = aggregate(ctx, mode, &encrypted).unwrap();
    decrypt_result(ctx, custodian, &aggregated).unwrap().weights
}

#[test]
fn test_concrete_scenario() {
    let (ctx, pk, custodian) = setup();
    let sites = [
        (w(SITE_A), Some(SampleCount(120.0))),
        (w(SITE_B), Some(SampleCount(80.0))),
    ];

    let weighted = run(&ctx, &pk, &custodian, AggregationMode::Weighted, &sites);
    assert_close(&weighted, &[0.12, 0.192, 0.28, 0.408, 0.058], 1e-6);

    let simple = run(&ctx, &pk, &custodian, AggregationMode::Simple, &sites);
    assert_close(&simple, &[0.125, 0.19, 0.275, 0.41, 0.06], 1e-6);
}

#[test]
fn test_single_site_roundtrip() {
    let (ctx, pk, custodian) = setup();
    let values = [-1.5, 0.0, 3.25, 1e-3, -42.0];
    let result = run(
        &ctx,
        &pk,
        &custodian,
        AggregationMode::Simple,
        &[(w(values), None)],
    );
    assert_close(&result, &values, 1e-6);
}

#[test]
fn test_identity_under_replication() {
    let (ctx, pk, custodian) = setup();
    let sites: Vec<_> = (0..6).map(|_| (w(SITE_A), None)).collect();
    let result = run(&ctx, &pk, &custodian, AggregationMode::Simple, &sites);
    assert_close(&result, &SITE_A, 1e-6);
}

#[test]
fn test_weighted_equal_counts_matches_simple() {
    let (ctx, pk, custodian) = setup();
    let sites = [
        (w(SITE_A), Some(SampleCount(50.0))),
        (w(SITE_B), Some(SampleCount(50.0))),
        (w([1.0, -1.0, 0.5, 0.25, 2.0]), Some(SampleCount(50.0))),
    ];
    let weighted = run(&ctx, &pk, &custodian, AggregationMode::Weighted, &sites);
    let simple = run(&ctx, &pk, &custodian, AggregationMode::Simple, &sites);
    assert_close(&weighted, &simple, 1e-4);
}

#[test]
fn test_weighted_counts_match_replicated_simple() {
    let (ctx, pk, custodian) = setup();
    let weighted = run(
        &ctx,
        &pk,
        &custodian,
        AggregationMode::Weighted,
        &[
            (w(SITE_A), Some(SampleCount(2.0))),
            (w(SITE_B), Some(SampleCount(1.0))),
        ],
    );
    let replicated = run(
        &ctx,
        &pk,
        &custodian,
        AggregationMode::Simple,
        &[(w(SITE_A), None), (w(SITE_A), None), (w(SITE_B), None)],
    );
    assert_close(&weighted, &replicated, 1e-4);
}

#[test]
fn test_aggregate_provenance() {
    let (ctx, pk, custodian) = setup();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let a = encrypt_with_rng(&ctx, &pk, &w(SITE_A), Some(SampleCount(120.0)), &mut rng).unwrap();
    let b = encrypt_with_rng(&ctx, &pk, &w(SITE_B), Some(SampleCount(80.0)), &mut rng).unwrap();
    assert_eq!(a.ciphertext.level(&ctx), ctx.fresh_level());

    let (aggregated, record) =
        aggregate(&ctx, AggregationMode::Weighted, &[a.clone(), b.clone()]).unwrap();
    assert_eq!(aggregated.level(&ctx), ctx.fresh_level() - 1);
    assert!(
        (aggregated.scale(&ctx) - ctx.scale()).abs() / ctx.scale() < 1e-9
    );

    assert_eq!(record.participants, 2);
    assert_eq!(
        record.inputs,
        vec![
            a.ciphertext.id().unwrap().to_string(),
            b.ciphertext.id().unwrap().to_string(),
        ]
    );
    assert_eq!(record.counts, Some(vec![120.0, 80.0]));
    assert_eq!(record.total_weight, Some(200.0));
    assert!(record.is_for_context(&ctx.fingerprint()));
    assert_eq!(record.output_id(), aggregated.id().unwrap().to_string());

    let result = decrypt_result(&ctx, &custodian, &aggregated).unwrap();
    assert_eq!(result.aggregate, aggregated.id().unwrap());
    assert_eq!(result.context, ctx.fingerprint());
    assert_eq!(result.public_key, pk.fingerprint());
}

#[test]
fn test_federated_round() {
    let ctx: CryptoContext = CryptoContext::from_params(CkksParams::fedavg_n8192()).unwrap();
    let mut round = FederatedRound::new(ctx, 2).unwrap();

    round
        .encrypt_and_submit(&w(SITE_A), Some(SampleCount(120.0)))
        .unwrap();
    round
        .encrypt_and_submit(&w(SITE_B), Some(SampleCount(80.0)))
        .unwrap();
    round.aggregate(AggregationMode::Weighted).unwrap();
    let result = round.decrypt().unwrap().clone();

    assert_eq!(round.stage(), Stage::Decrypted);
    assert_close(&result.weights, &[0.12, 0.192, 0.28, 0.408, 0.058], 1e-6);
}

#[test]
fn test_site_ciphertexts_are_randomized() {
    let (ctx, pk, _) = setup();
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let a: SiteCiphertext = encrypt_with_rng(&ctx, &pk, &w(SITE_A), None, &mut rng).unwrap();
    let b: SiteCiphertext = encrypt_with_rng(&ctx, &pk, &w(SITE_A), None, &mut rng).unwrap();
    assert_ne!(a.ciphertext.id().unwrap(), b.ciphertext.id().unwrap());
}
