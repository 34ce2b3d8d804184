//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use tessera::{
    AttributeId, ClassId, ClassSpec, LogicalType, RelationId, RelationPair, Schema, SchemaBuilder,
};

/// A small geography schema.
pub struct Geo {
    pub schema: Arc<Schema>,
    pub wrapper: ClassId,
    pub place: ClassId,
    pub country: ClassId,
    pub city: ClassId,
    pub has_child: RelationId,
    pub child_of: RelationId,
    pub has_capital: RelationId,
    pub capital_of: RelationId,
    pub near: RelationId,
    pub near_of: RelationId,
    pub name: AttributeId,
    pub population: AttributeId,
}

pub fn geo() -> Geo {
    let mut b = SchemaBuilder::new();
    let name = b.attribute("name", LogicalType::String);
    let population = b.attribute("population", LogicalType::Int64);
    let (has_child, child_of) =
        b.relation_pair(RelationPair::new("has_child", "child_of").containment());
    let (has_capital, capital_of) = b.relation_pair(
        RelationPair::new("has_capital", "capital_of")
            .containment()
            .subrelation_of(has_child),
    );
    let (near, near_of) = b.relation_pair(RelationPair::new("near", "near_of"));
    let wrapper = b.class(ClassSpec::new("Wrapper").wrapper().default_relation(has_child));
    let place = b.class(
        ClassSpec::new("Place")
            .attribute(name)
            .default_relation(has_child),
    );
    let country = b.class(ClassSpec::new("Country").subclass_of(place));
    let city = b.class(
        ClassSpec::new("City")
            .subclass_of(place)
            .attribute(population),
    );
    Geo {
        schema: Arc::new(b.build().expect("geo schema is valid")),
        wrapper,
        place,
        country,
        city,
        has_child,
        child_of,
        has_capital,
        capital_of,
        near,
        near_of,
        name,
        population,
    }
}

/// Installs a test subscriber once.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::WARN)
            .with_test_writer()
            .try_init();
    });
}
