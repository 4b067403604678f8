//! Seeded fuzz loops over the canonicalizer and kernel invariants.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use verdict_core::{
    evaluate, fingerprint, value_to_canonical_bytes, Algorithm, AlgorithmParams, DecisionSpec,
};

fn lcg_next(seed: u64) -> u64 {
    seed.wrapping_mul(6364136223846793005).wrapping_add(1)
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = lcg_next(self.0);
        self.0
    }

    fn next_f64(&mut self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let value = (self.next() >> 11) as f64 / (1u64 << 53) as f64;
        value
    }
}

fn generate_value(lcg: &mut Lcg, depth: u32) -> Value {
    let variant = if depth == 0 { lcg.next() % 4 } else { lcg.next() % 6 };
    match variant {
        0 => Value::Null,
        1 => json!(lcg.next() % 2 == 0),
        2 => {
            #[allow(clippy::cast_possible_wrap)]
            let n = (lcg.next() % 20001) as i64 - 10000;
            json!(n)
        }
        3 => json!(format!("v{}", lcg.next() % 1000)),
        4 => {
            let len = (lcg.next() % 4) as usize;
            Value::Array((0..len).map(|_| generate_value(lcg, depth - 1)).collect())
        }
        _ => {
            let len = (lcg.next() % 4) as usize;
            let mut map = serde_json::Map::new();
            for _ in 0..len {
                map.insert(format!("k{}", lcg.next() % 16), generate_value(lcg, depth - 1));
            }
            Value::Object(map)
        }
    }
}

fn permute_keys(value: &Value, lcg: &mut Lcg) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .iter()
                .map(|(k, v)| (k.clone(), permute_keys(v, lcg)))
                .collect();
            // Deterministic shuffle driven by the fuzz seed.
            for i in (1..entries.len()).rev() {
                #[allow(clippy::cast_possible_truncation)]
                let j = (lcg.next() % (i as u64 + 1)) as usize;
                entries.swap(i, j);
            }
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| permute_keys(v, lcg)).collect()),
        other => other.clone(),
    }
}

#[test]
fn fuzz_canonical_idempotence() {
    for seed in 0_u64..256 {
        let mut lcg = Lcg(seed);
        let value = generate_value(&mut lcg, 3);
        let first = value_to_canonical_bytes(&value).unwrap();
        let reparsed: Value = serde_json::from_slice(&first).unwrap();
        let second = value_to_canonical_bytes(&reparsed).unwrap();
        assert_eq!(first, second, "seed={seed}");
    }
}

#[test]
fn fuzz_canonical_key_permutation_invariance() {
    for seed in 0_u64..256 {
        let mut lcg = Lcg(seed);
        let value = generate_value(&mut lcg, 3);
        let permuted = permute_keys(&value, &mut lcg);
        assert_eq!(
            fingerprint(&value).unwrap(),
            fingerprint(&permuted).unwrap(),
            "seed={seed}"
        );
    }
}

fn generate_spec(lcg: &mut Lcg) -> DecisionSpec {
    let action_count = (lcg.next() % 4 + 2) as usize;
    let state_count = (lcg.next() % 3 + 1) as usize;
    let actions: Vec<String> = (0..action_count).map(|i| format!("act{i}")).collect();
    let states: Vec<String> = (0..state_count).map(|i| format!("st{i}")).collect();
    let mut outcomes = BTreeMap::new();
    for action in &actions {
        let mut row = BTreeMap::new();
        for state in &states {
            row.insert(state.clone(), (lcg.next_f64() - 0.5) * 200.0);
        }
        outcomes.insert(action.clone(), row);
    }
    DecisionSpec {
        actions,
        states,
        outcomes,
    }
}

#[test]
fn fuzz_ranking_is_a_permutation_with_recommended_first() {
    for seed in 0_u64..128 {
        let mut lcg = Lcg(seed);
        let spec = generate_spec(&mut lcg);
        for algorithm in Algorithm::ALL {
            let mut params = AlgorithmParams::new(algorithm);
            if algorithm.uses_weights() {
                params.weights = Some(
                    spec.states
                        .iter()
                        .map(|s| (s.clone(), lcg.next_f64() + 0.01))
                        .collect(),
                );
            }
            let result = evaluate(&spec, &params, None).unwrap();
            assert_eq!(
                result.recommended_action, result.ranking[0],
                "seed={seed} algorithm={}",
                algorithm.as_str()
            );
            let mut ranked = result.ranking.clone();
            ranked.sort();
            let mut expected = spec.actions.clone();
            expected.sort();
            assert_eq!(ranked, expected, "seed={seed} algorithm={}", algorithm.as_str());
        }
    }
}

#[test]
fn fuzz_kernel_purity_byte_equal_reruns() {
    for seed in 0_u64..64 {
        let mut lcg = Lcg(seed);
        let spec = generate_spec(&mut lcg);
        let params = AlgorithmParams::new(Algorithm::MinimaxRegret);
        let r1 = evaluate(&spec, &params, None).unwrap();
        let r2 = evaluate(&spec, &params, None).unwrap();
        assert_eq!(
            verdict_core::to_canonical_bytes(&r1).unwrap(),
            verdict_core::to_canonical_bytes(&r2).unwrap(),
            "seed={seed}"
        );
    }
}

#[test]
fn fuzz_weight_scaling_invariance() {
    for seed in 0_u64..64 {
        let mut lcg = Lcg(seed);
        let spec = generate_spec(&mut lcg);
        let weights: BTreeMap<String, f64> = spec
            .states
            .iter()
            .map(|s| (s.clone(), lcg.next_f64() + 0.01))
            .collect();
        let scale = lcg.next_f64() * 9.0 + 0.5;

        let mut base = AlgorithmParams::new(Algorithm::WeightedSum);
        base.weights = Some(weights.clone());
        let mut scaled = AlgorithmParams::new(Algorithm::WeightedSum);
        scaled.weights = Some(weights.iter().map(|(k, v)| (k.clone(), v * scale)).collect());

        let r1 = evaluate(&spec, &base, None).unwrap();
        let r2 = evaluate(&spec, &scaled, None).unwrap();
        assert_eq!(r1.ranking, r2.ranking, "seed={seed}");
        assert_eq!(r1.trace.fingerprint, r2.trace.fingerprint, "seed={seed}");
    }
}
