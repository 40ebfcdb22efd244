use bb_rules::{dump, dump_compact, load, Rule};
use proptest::prelude::*;

fn path() -> impl Strategy<Value = String> {
    "[a-z0-9_./-]{1,16}"
}

fn rule() -> impl Strategy<Value = Rule> {
    (
        prop::collection::vec(path(), 0..4),
        prop::collection::vec(".{0,12}", 1..6),
        prop::collection::vec(path(), 0..3),
    )
        .prop_map(|(inputs, task, outputs)| {
            // Drop anything that would make a rule produce its own input.
            let outputs = outputs
                .into_iter()
                .filter(|o| !inputs.contains(o))
                .collect();
            Rule::new(inputs, task, outputs)
        })
}

proptest! {
    #[test]
    fn dump_then_load_preserves_content_and_order(rules in prop::collection::vec(rule(), 0..8)) {
        let mut pretty = Vec::new();
        dump(rules.clone(), &mut pretty).expect("dump");
        prop_assert_eq!(&load(&pretty[..]).expect("load"), &rules);

        let mut compact = Vec::new();
        dump_compact(rules.clone(), &mut compact).expect("dump");
        prop_assert_eq!(&load(&compact[..]).expect("load"), &rules);
    }
}
