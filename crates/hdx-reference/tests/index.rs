use hdx_model::AdminLevel;
use hdx_reference::{AdminIndex, CountryRecord, ReferenceData, ReferenceError, SubdivisionRecord};
use proptest::prelude::*;

fn afghanistan() -> ReferenceData {
    ReferenceData::new()
        .with_country(
            CountryRecord::new("AFG")
                .with_name("Afghanistan")
                .with_code_length(6)
                .with_region("ROAP"),
        )
        .with_country(
            CountryRecord::new("SYR")
                .with_iso2("SY")
                .with_name("Syrian Arab Republic")
                .with_code_length(4)
                .with_region("ROMENA"),
        )
        .with_subdivision(SubdivisionRecord::new("AFG", "AF0101", "Kabul"))
        .with_subdivision(SubdivisionRecord::new("AFG", "AF0201", "Hérat"))
        .with_subdivision(SubdivisionRecord::new("SYR", "SY01", "Damascus"))
}

#[test]
fn build_exposes_codes_names_and_parents() {
    let index = AdminIndex::build(afghanistan()).expect("build index");

    assert!(index.country_codes().contains("AFG"));
    assert_eq!(index.subdivision_codes().len(), 3);
    assert_eq!(index.code_length("AFG"), Some(6));
    assert_eq!(index.code_length("XXX"), None);
    assert_eq!(index.display_name("AF0201"), Some("Hérat"));
    assert_eq!(index.display_name("AFG"), Some("Afghanistan"));
    assert_eq!(index.parent_country("SY01"), Some("SYR"));
    assert!(index.contains("AF0101", AdminLevel::Subdivision));
    assert!(!index.contains("AF0101", AdminLevel::Country));

    let names = index.name_index("AFG").expect("name index");
    assert_eq!(names.get("herat"), Some("AF0201"));
    assert_eq!(
        index.subdivisions_of("AFG"),
        &["AF0101".to_string(), "AF0201".to_string()]
    );
}

#[test]
fn iso2_is_derived_when_not_registered() {
    let index = AdminIndex::build(afghanistan()).expect("build index");
    assert_eq!(index.iso2("AFG"), Some("AF"));
    assert_eq!(index.iso2("SYR"), Some("SY"));
    assert_eq!(index.iso3_for_iso2("af"), Some("AFG"));
}

#[test]
fn regions_group_countries() {
    let index = AdminIndex::build(afghanistan()).expect("build index");
    assert_eq!(index.regions_of("AFG"), &["ROAP".to_string()]);
    let romena: Vec<&str> = index.countries_in_region("ROMENA").collect();
    assert_eq!(romena, vec!["SYR"]);
    assert_eq!(index.countries_in_region("NOPE").count(), 0);
}

#[test]
fn country_without_subdivisions_has_no_name_index() {
    let data = afghanistan().with_country(CountryRecord::new("NOR").with_name("Norway"));
    let index = AdminIndex::build(data).expect("build index");
    assert!(index.name_index("NOR").is_none());
    assert_eq!(index.country_name_index().get("norway"), Some("NOR"));
}

#[test]
fn duplicate_subdivision_code_is_rejected() {
    let data = afghanistan().with_subdivision(SubdivisionRecord::new("AFG", "AF0101", "Kabol"));
    let err = AdminIndex::build(data).unwrap_err();
    assert!(matches!(err, ReferenceError::DuplicateCode { ref code } if code == "AF0101"));
}

#[test]
fn duplicate_country_code_is_rejected() {
    let data = afghanistan().with_country(CountryRecord::new("AFG"));
    assert!(matches!(
        AdminIndex::build(data),
        Err(ReferenceError::DuplicateCode { .. })
    ));
}

#[test]
fn missing_code_length_is_a_configuration_error() {
    let data = ReferenceData::new()
        .with_country(CountryRecord::new("IRQ"))
        .with_subdivision(SubdivisionRecord::new("IRQ", "IQG01", "Anbar"));
    let err = AdminIndex::build(data).unwrap_err();
    assert!(matches!(err, ReferenceError::MissingCodeLength { ref country } if country == "IRQ"));

    let converted: hdx_model::HdxError = err.into();
    assert!(converted.is_configuration());
}

#[test]
fn inconsistent_code_length_is_rejected() {
    let data = afghanistan().with_subdivision(SubdivisionRecord::new("AFG", "AF03", "Kapisa"));
    assert!(matches!(
        AdminIndex::build(data),
        Err(ReferenceError::InconsistentCodeLength {
            expected: 6,
            actual: 4,
            ..
        })
    ));
}

#[test]
fn unknown_country_is_rejected() {
    let data = afghanistan().with_subdivision(SubdivisionRecord::new("IRQ", "IQG01", "Anbar"));
    assert!(matches!(
        AdminIndex::build(data),
        Err(ReferenceError::UnknownCountry { .. })
    ));
}

#[test]
fn lengths_are_inferred_from_subdivisions() {
    let data = ReferenceData::from_subdivisions(vec![
        SubdivisionRecord::new("IRQ", "IQG01", "Anbar"),
        SubdivisionRecord::new("IRQ", "IQG02", "Basrah"),
    ]);
    assert_eq!(data.countries.len(), 1);
    let index = AdminIndex::build(data).expect("build index");
    assert_eq!(index.code_length("IRQ"), Some(5));
}

proptest! {
    #[test]
    fn every_subdivision_has_a_consistent_parent(count in 1usize..40) {
        let subdivisions = (0..count)
            .map(|n| SubdivisionRecord::new("AFG", format!("AF{n:04}"), format!("Province {n}")))
            .collect();
        let index = AdminIndex::build(ReferenceData::from_subdivisions(subdivisions))
            .expect("build index");

        prop_assert_eq!(index.subdivision_codes().len(), count);
        for code in index.subdivision_codes() {
            prop_assert_eq!(index.parent_country(code), Some("AFG"));
            prop_assert_eq!(Some(code.len()), index.code_length("AFG"));
        }
    }
}
