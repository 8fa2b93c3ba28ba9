use hdx_match::{AdminResolver, ResolverConfig, convert_code_length};
use hdx_model::{AdminLevel, AuditBundle, AuditRecord, ResolutionMethod};
use hdx_reference::{AdminIndex, CountryRecord, ReferenceData, SubdivisionRecord};
use proptest::prelude::*;

fn reference() -> AdminIndex {
    let data = ReferenceData::new()
        .with_country(
            CountryRecord::new("AFG")
                .with_name("Afghanistan")
                .with_code_length(6),
        )
        .with_country(
            CountryRecord::new("SYR")
                .with_iso2("SY")
                .with_name("Syrian Arab Republic")
                .with_code_length(4),
        )
        .with_country(CountryRecord::new("NOR").with_name("Norway"))
        .with_subdivision(SubdivisionRecord::new("AFG", "AF0101", "Kabul"))
        .with_subdivision(SubdivisionRecord::new("AFG", "AF0201", "Herat"))
        .with_subdivision(SubdivisionRecord::new("AFG", "AF0301", "Kandahar"))
        .with_subdivision(SubdivisionRecord::new("SYR", "SY01", "Damascus"))
        .with_subdivision(SubdivisionRecord::new("SYR", "SY08", "Al-Hasakah"));
    AdminIndex::build(data).expect("build reference index")
}

fn resolver(index: &AdminIndex) -> AdminResolver<'_> {
    AdminResolver::new(index, ResolverConfig::default()).expect("build resolver")
}

#[test]
fn canonical_code_resolves_exact() {
    let index = reference();
    let result = resolver(&index).resolve("AFG", "AF0201", AdminLevel::Subdivision, "acled");
    assert_eq!(result.code.as_deref(), Some("AF0201"));
    assert_eq!(result.method, ResolutionMethod::Exact);
    assert!(result.audit.is_none());
}

#[test]
fn short_code_converts_to_registered_length() {
    let index = reference();
    let result = resolver(&index).resolve("AFG", "AF01", AdminLevel::Subdivision, "wfp");
    assert_eq!(result.code.as_deref(), Some("AF0101"));
    assert_eq!(result.method, ResolutionMethod::LengthConverted);
}

#[test]
fn iso3_code_converts_to_iso2_convention() {
    let index = reference();
    let result = resolver(&index).resolve("SYR", "SYR001", AdminLevel::Subdivision, "wfp");
    assert_eq!(result.code.as_deref(), Some("SY01"));
    assert_eq!(result.method, ResolutionMethod::LengthConverted);
}

#[test]
fn code_of_another_country_is_not_converted() {
    let index = reference();
    assert_eq!(convert_code_length(&index, "AFG", "SYR001"), None);
}

#[test]
fn non_ascii_digits_are_not_code_shaped() {
    let index = reference();
    assert_eq!(convert_code_length(&index, "SYR", "SY\u{0966}"), None);
    let result = resolver(&index).resolve("SYR", "SY\u{0966}", AdminLevel::Subdivision, "wfp");
    assert!(!result.is_resolved());
}

#[test]
fn misspelling_resolves_phonetically() {
    let index = reference();
    let result = resolver(&index).resolve("AFG", "Kaboul", AdminLevel::Subdivision, "acled");
    assert_eq!(result.code.as_deref(), Some("AF0101"));
    assert_eq!(result.method, ResolutionMethod::Phonetic);
    assert!(matches!(result.audit, Some(AuditRecord::Match(_))));
}

#[test]
fn gibberish_is_unresolved_with_error_record() {
    let index = reference();
    let result = resolver(&index).resolve("AFG", "Zzzqx", AdminLevel::Subdivision, "wfp");
    assert!(!result.is_resolved());
    assert_eq!(result.method, ResolutionMethod::Unresolved);
    assert!(matches!(result.audit, Some(AuditRecord::Error(_))));
}

#[test]
fn accented_and_cased_names_resolve_exact() {
    let index = reference();
    let resolver = resolver(&index);
    let result = resolver.resolve("SYR", "al hasakah", AdminLevel::Subdivision, "acled");
    assert_eq!(result.code.as_deref(), Some("SY08"));
    assert_eq!(result.method, ResolutionMethod::Exact);
    let result = resolver.resolve("AFG", " HÉRAT ", AdminLevel::Subdivision, "acled");
    assert_eq!(result.code.as_deref(), Some("AF0201"));
}

#[test]
fn transliterated_names_resolve_exact() {
    let data = ReferenceData::new()
        .with_country(
            CountryRecord::new("TUR")
                .with_name("Türkiye")
                .with_code_length(4),
        )
        .with_country(
            CountryRecord::new("DEU")
                .with_name("Deutschland")
                .with_code_length(5),
        )
        .with_subdivision(SubdivisionRecord::new("TUR", "TR63", "Şanlıurfa"))
        .with_subdivision(SubdivisionRecord::new("DEU", "DE721", "Gießen"));
    let index = AdminIndex::build(data).expect("build reference index");
    let resolver = resolver(&index);

    let dotless = resolver.resolve("TUR", "Sanliurfa", AdminLevel::Subdivision, "acled");
    assert_eq!(dotless.code.as_deref(), Some("TR63"));
    assert_eq!(dotless.method, ResolutionMethod::Exact);

    let sharp_s = resolver.resolve("DEU", "Giessen", AdminLevel::Subdivision, "acled");
    assert_eq!(sharp_s.code.as_deref(), Some("DE721"));
    assert_eq!(sharp_s.method, ResolutionMethod::Exact);

    let country = resolver.resolve("", "Turkiye", AdminLevel::Country, "acled");
    assert_eq!(country.code.as_deref(), Some("TUR"));
    assert_eq!(country.method, ResolutionMethod::Exact);
}

#[test]
fn partial_name_resolves_by_substring() {
    let index = reference();
    let result = resolver(&index).resolve("AFG", "Kandah", AdminLevel::Subdivision, "acled");
    assert_eq!(result.code.as_deref(), Some("AF0301"));
    assert_eq!(result.method, ResolutionMethod::Substring);
}

#[test]
fn article_variant_reaches_phonetic_match() {
    let index = reference();
    let result = resolver(&index).resolve("SYR", "Hasake", AdminLevel::Subdivision, "acled");
    assert_eq!(result.code.as_deref(), Some("SY08"));
    assert_eq!(result.method, ResolutionMethod::Phonetic);
}

#[test]
fn country_without_subdivisions_is_ignored() {
    let index = reference();
    let result = resolver(&index).resolve("NOR", "Oslo", AdminLevel::Subdivision, "acled");
    assert!(!result.is_resolved());
    assert!(matches!(result.audit, Some(AuditRecord::Ignored(ref e)) if e.token.is_none()));
}

#[test]
fn ignore_list_short_circuits_fuzzy_matching() {
    let index = reference();
    let config = ResolverConfig {
        fuzzy_ignore: vec!["Unknown".to_string()],
        ..ResolverConfig::default()
    };
    let resolver = AdminResolver::new(&index, config).expect("build resolver");
    let result = resolver.resolve("AFG", "unknown", AdminLevel::Subdivision, "acled");
    assert!(!result.is_resolved());
    assert!(matches!(result.audit, Some(AuditRecord::Ignored(_))));
}

#[test]
fn overrides_and_replacements_apply() {
    let index = reference();
    let config = ResolverConfig::from_toml_str(
        r#"
        [name_mappings]
        "AFG|Kabul City" = "AF0101"
        "AFG|Damascus Gov" = "SY01"

        [name_replacements]
        "hirat" = "herat"
        "#,
    )
    .expect("parse config");
    let resolver = AdminResolver::new(&index, config).expect("build resolver");

    let mapped = resolver.resolve("AFG", "Kabul City", AdminLevel::Subdivision, "acled");
    assert_eq!(mapped.code.as_deref(), Some("AF0101"));
    assert_eq!(mapped.method, ResolutionMethod::Exact);

    let foreign = resolver.resolve("AFG", "Damascus Gov", AdminLevel::Subdivision, "acled");
    assert_ne!(foreign.code.as_deref(), Some("SY01"));

    let replaced = resolver.resolve("AFG", "Hirat", AdminLevel::Subdivision, "acled");
    assert_eq!(replaced.code.as_deref(), Some("AF0201"));
    assert_eq!(replaced.method, ResolutionMethod::Exact);
}

#[test]
fn fuzzy_allow_list_restricts_approximate_matching() {
    let index = reference();
    let config = ResolverConfig {
        fuzzy_countries: Some(vec!["SYR".to_string()]),
        ..ResolverConfig::default()
    };
    let resolver = AdminResolver::new(&index, config).expect("build resolver");

    let exact = resolver.resolve("AFG", "Kabul", AdminLevel::Subdivision, "acled");
    assert_eq!(exact.code.as_deref(), Some("AF0101"));
    let fuzzy = resolver.resolve("AFG", "Kaboul", AdminLevel::Subdivision, "acled");
    assert!(!fuzzy.is_resolved());
    assert!(matches!(fuzzy.audit, Some(AuditRecord::Ignored(_))));
}

#[test]
fn country_level_resolution() {
    let index = reference();
    let resolver = resolver(&index);

    let iso3 = resolver.resolve("", "SYR", AdminLevel::Country, "acled");
    assert_eq!(iso3.method, ResolutionMethod::Exact);
    let iso2 = resolver.resolve("", "af", AdminLevel::Country, "acled");
    assert_eq!(iso2.code.as_deref(), Some("AFG"));
    assert_eq!(iso2.method, ResolutionMethod::LengthConverted);
    let name = resolver.resolve("", "Afghanistan", AdminLevel::Country, "acled");
    assert_eq!(name.code.as_deref(), Some("AFG"));
    let misspelt = resolver.resolve("", "Afganistan", AdminLevel::Country, "acled");
    assert_eq!(misspelt.code.as_deref(), Some("AFG"));
    assert_eq!(misspelt.method, ResolutionMethod::Phonetic);
}

#[test]
fn audit_lines_are_sorted() {
    let index = reference();
    let resolver = resolver(&index);
    let mut audit = AuditBundle::new();
    for (source, country, token) in [
        ("wfp", "AFG", "Zzzqx"),
        ("wfp", "AFG", "AF01"),
        ("acled", "NOR", "Oslo"),
        ("acled", "AFG", "Kandah"),
        ("acled", "AFG", "Kaboul"),
        ("acled", "AFG", "Kaboul"),
    ] {
        resolver.resolve_into(country, token, AdminLevel::Subdivision, source, &mut audit);
    }

    let lines = [
        audit.match_lines(),
        audit.ignored_lines(),
        audit.error_lines(),
    ]
    .concat();
    insta::assert_snapshot!(lines.join("\n"), @r"
    acled - AFG: matching (phonetic) Kaboul to Kabul on map
    acled - AFG: matching (substring) Kandah to Kandahar on map
    wfp - AFG: matching (length-converted) AF01 to Kabul on map
    acled - NOR: ignored
    wfp - AFG: could not find Zzzqx
    ");
}

proptest! {
    #[test]
    fn canonical_codes_resolve_unchanged(
        code in prop::sample::select(vec!["AF0101", "AF0201", "AF0301", "SY01", "SY08"])
    ) {
        let index = reference();
        let result = resolver(&index).resolve("AFG", code, AdminLevel::Subdivision, "prop");
        prop_assert_eq!(result.method, ResolutionMethod::Exact);
        prop_assert_eq!(result.code.as_deref(), Some(code));
    }

    #[test]
    fn conversion_never_yields_unknown_codes(
        prefix in "(AF|AFG|SY|SYR|IQ)",
        digits in "[0-9]{1,4}",
        country in prop::sample::select(vec!["AFG", "SYR"]),
    ) {
        let index = reference();
        let token = format!("{prefix}{digits}");
        if let Some(code) = convert_code_length(&index, country, &token) {
            prop_assert!(index.contains(&code, AdminLevel::Subdivision));
            prop_assert_eq!(index.parent_country(&code), Some(country));
            prop_assert_eq!(Some(code.len()), index.code_length(country));
        }
    }

    #[test]
    fn code_like_tokens_never_panic(prefix in "(AF|AFG|SY|SYR)", tail in "\\PC{1,4}") {
        let index = reference();
        let token = format!("{prefix}{tail}");
        let result = resolver(&index).resolve("SYR", &token, AdminLevel::Subdivision, "prop");
        if let Some(code) = result.code {
            prop_assert!(index.contains(&code, AdminLevel::Subdivision));
        }
    }

    #[test]
    fn phonetic_resolution_is_deterministic(token in "[a-z]{1,10}") {
        let index = reference();
        let resolver = resolver(&index);
        let first = resolver.resolve("AFG", &token, AdminLevel::Subdivision, "prop");
        let second = resolver.resolve("AFG", &token, AdminLevel::Subdivision, "prop");
        prop_assert_eq!(first, second);
    }
}
