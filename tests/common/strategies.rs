use proptest::prelude::*;
use proptest::strategy::Just;

/// Registration operation against a small pool of deployments and topics
#[derive(Debug, Clone)]
pub enum RegistrationOp {
    Add { deployment: usize, topics: Vec<usize> },
    Remove { deployment: usize },
}

pub const DEPLOYMENTS: [&str; 4] = ["g:a:1.0", "g:a:2.0", "g:b:1.0", "plain"];
pub const TOPICS: [&str; 5] = ["alpha", "beta", "gamma", "delta", "epsilon"];

pub fn registration_op_strategy() -> impl Strategy<Value = RegistrationOp> {
    prop_oneof![
        3 => (0..DEPLOYMENTS.len(), prop::collection::vec(0..TOPICS.len(), 0..4))
            .prop_map(|(deployment, topics)| RegistrationOp::Add { deployment, topics }),
        2 => (0..DEPLOYMENTS.len()).prop_map(|deployment| RegistrationOp::Remove { deployment }),
    ]
}

pub fn registration_ops_strategy() -> impl Strategy<Value = Vec<RegistrationOp>> {
    prop::collection::vec(registration_op_strategy(), 0..30)
}

/// Strategy for generating version strings with numbers and qualifiers
///
/// Zero padding lands between the numbers and the qualifier so that `1-sp1`,
/// `1.0-alpha1` and `1.0.0` all appear side by side.
pub fn version_strategy() -> impl Strategy<Value = String> {
    let qualifier = prop_oneof![
        Just(String::new()),
        Just("-alpha1".to_string()),
        Just("-beta".to_string()),
        Just("-rc2".to_string()),
        Just("-SNAPSHOT".to_string()),
        Just("-sp1".to_string()),
        Just(".Final".to_string()),
        "-[a-z]{1,5}",
    ];
    (
        prop::collection::vec(0u32..20, 1..4),
        0usize..3,
        qualifier,
        prop::option::of(0u32..5),
    )
        .prop_map(|(numbers, zeros, qualifier, suffix)| {
            let mut dotted: Vec<String> = numbers.iter().map(u32::to_string).collect();
            dotted.extend(std::iter::repeat("0".to_string()).take(zeros));
            let suffix = match suffix {
                Some(n) if !qualifier.is_empty() => format!(".{n}"),
                _ => String::new(),
            };
            format!("{}{}{}", dotted.join("."), qualifier, suffix)
        })
}

/// JSON payloads that serde_json round-trips exactly (no floats)
pub fn json_payload_strategy() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-zA-Z0-9 _-]{0,16}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|map| {
                serde_json::Value::Object(map.into_iter().collect())
            }),
        ]
    })
}
