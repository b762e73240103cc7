use proptest::prelude::*;
use rsql_criteria::query::executor::{Datum, InMemoryStore, Record, RowRef};
use rsql_criteria::query::metadata::{AttributeType, Cardinality, InMemoryMetadata};
use rsql_criteria::query::predicate::Predicate;
use rsql_criteria::query::value::Value;
use rsql_criteria::query::{CountQueryVisitor, CriteriaQueryVisitor, Node};
use rsql_criteria::types::EntityId;
use std::collections::BTreeSet;

const PERSON: EntityId = EntityId(1);
const TITLE: EntityId = EntityId(2);
const TITLES: [&str; 3] = ["Phd", "Consultant", "Engineer"];

#[derive(Debug, Clone)]
struct PersonRow {
    age: i64,
    name: String,
    titles: Vec<usize>,
}

fn arb_person() -> impl Strategy<Value = PersonRow> {
    (
        0i64..100,
        "[a-c]{1,4}",
        prop::collection::btree_set(0usize..TITLES.len(), 0..=TITLES.len()),
    )
        .prop_map(|(age, name, titles)| PersonRow {
            age,
            name,
            titles: titles.into_iter().collect(),
        })
}

fn arb_operator() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["==", "!=", "=gt=", "=ge=", "=lt=", "=le="])
}

fn arb_scalar_leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        (arb_operator(), 0i64..100)
            .prop_map(|(op, age)| Node::comparison("age", op, [age.to_string()])),
        "[a-c*]{1,4}".prop_map(|name| Node::comparison("name", "==", [name])),
    ]
}

fn arb_title_leaf() -> impl Strategy<Value = Node> {
    prop::sample::select(TITLES.to_vec())
        .prop_map(|title| Node::comparison("titles.name", "==", [title]))
}

fn grouped(leaf: BoxedStrategy<Node>) -> impl Strategy<Value = Node> {
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Node::and),
            prop::collection::vec(inner, 1..4).prop_map(Node::or),
        ]
    })
}

fn arb_filter() -> impl Strategy<Value = Node> {
    grouped(prop_oneof![arb_scalar_leaf(), arb_title_leaf()].boxed())
}

/// Filters without collection joins keep one tuple per person.
fn arb_scalar_filter() -> impl Strategy<Value = Node> {
    grouped(arb_scalar_leaf().boxed())
}

fn metadata() -> InMemoryMetadata {
    InMemoryMetadata::new()
        .with_entity(PERSON, "Person")
        .with_entity(TITLE, "Title")
        .with_identifier(PERSON, "id", AttributeType::Integer)
        .with_attribute(PERSON, "age", AttributeType::Integer)
        .with_attribute(PERSON, "name", AttributeType::Text)
        .with_association(PERSON, "titles", TITLE, Cardinality::Collection)
        .with_identifier(TITLE, "id", AttributeType::Integer)
        .with_attribute(TITLE, "name", AttributeType::Text)
}

fn populate(people: &[PersonRow]) -> InMemoryStore {
    let mut store = InMemoryStore::new();
    store.create_table(PERSON, "id");
    store.create_table(TITLE, "id");
    let titles: Vec<RowRef> = TITLES
        .iter()
        .zip(1i64..)
        .map(|(name, id)| {
            store
                .insert(TITLE, Record::new().with("id", id).with("name", *name))
                .unwrap()
        })
        .collect();
    for (person, id) in people.iter().zip(1i64..) {
        let refs = person.titles.iter().map(|idx| titles[*idx]).collect();
        store
            .insert(
                PERSON,
                Record::new()
                    .with("id", id)
                    .with("age", person.age)
                    .with("name", person.name.as_str())
                    .with("titles", Datum::References(refs)),
            )
            .unwrap();
    }
    store
}

fn rows(store: &InMemoryStore, filter: &Node) -> BTreeSet<usize> {
    let meta = metadata();
    let query = CriteriaQueryVisitor::new(&meta, PERSON).compile(filter).unwrap();
    store
        .select(&query)
        .unwrap()
        .into_iter()
        .map(|row| row.row)
        .collect()
}

proptest! {
    #[test]
    fn prop_count_matches_selection(
        people in prop::collection::vec(arb_person(), 0..12),
        filter in arb_filter()
    ) {
        let meta = metadata();
        let store = populate(&people);
        let select = CriteriaQueryVisitor::new(&meta, PERSON).compile(&filter).unwrap();
        let count = CountQueryVisitor::new(&meta, PERSON).compile(&filter).unwrap();
        prop_assert_eq!(select.filter(), count.filter());
        prop_assert_eq!(select.joins(), count.joins());
        prop_assert_eq!(store.select(&select).unwrap().len() as u64, store.count(&count).unwrap());
    }

    #[test]
    fn prop_membership_keeps_argument_order(
        ages in prop::collection::vec(any::<i64>(), 1..8),
        negated in any::<bool>()
    ) {
        let meta = metadata();
        let op = if negated { "=out=" } else { "=in=" };
        let arguments: Vec<String> = ages.iter().map(i64::to_string).collect();
        let query = CriteriaQueryVisitor::new(&meta, PERSON)
            .compile(&Node::comparison("age", op, arguments))
            .unwrap();
        match query.filter() {
            Some(Predicate::In { values, negated: got, .. }) => {
                prop_assert_eq!(*got, negated);
                let expected: Vec<Value> = ages.iter().copied().map(Value::Int).collect();
                prop_assert_eq!(values, &expected);
            }
            other => prop_assert!(false, "unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn prop_repeated_traversal_shares_one_join(repeats in 1usize..10) {
        let meta = metadata();
        let children = (0..repeats)
            .map(|idx| Node::comparison("titles.name", "==", [TITLES[idx % TITLES.len()]]))
            .collect();
        let query = CriteriaQueryVisitor::new(&meta, PERSON)
            .compile(&Node::or(children))
            .unwrap();
        prop_assert_eq!(query.join_count(), 1);
        prop_assert_eq!(query.filter().map(Predicate::leaf_count), Some(repeats));
    }

    #[test]
    fn prop_and_or_follow_set_algebra(
        people in prop::collection::vec(arb_person(), 0..12),
        lhs in arb_scalar_filter(),
        rhs in arb_scalar_filter()
    ) {
        let store = populate(&people);
        let left = rows(&store, &lhs);
        let right = rows(&store, &rhs);
        let union: BTreeSet<usize> = left.union(&right).copied().collect();
        let both: BTreeSet<usize> = left.intersection(&right).copied().collect();
        prop_assert_eq!(rows(&store, &Node::or(vec![lhs.clone(), rhs.clone()])), union);
        prop_assert_eq!(rows(&store, &Node::and(vec![lhs, rhs])), both);
    }

    #[test]
    fn prop_contradiction_selects_nothing(
        people in prop::collection::vec(arb_person(), 0..12),
        age in 0i64..100
    ) {
        let store = populate(&people);
        let filter = Node::and(vec![
            Node::comparison("age", "=lt=", [age.to_string()]),
            Node::comparison("age", "=ge=", [age.to_string()]),
        ]);
        prop_assert!(rows(&store, &filter).is_empty());
    }

    #[test]
    fn prop_prefix_wildcard_is_starts_with(
        people in prop::collection::vec(arb_person(), 0..12),
        prefix in "[a-c]{1,2}"
    ) {
        let store = populate(&people);
        let expected: BTreeSet<usize> = people
            .iter()
            .enumerate()
            .filter(|(_, p)| p.name.starts_with(prefix.as_str()))
            .map(|(idx, _)| idx)
            .collect();
        let pattern = format!("{prefix}*");
        prop_assert_eq!(rows(&store, &Node::comparison("name", "==", [pattern])), expected);
    }
}
