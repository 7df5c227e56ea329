use adgm_check::{
    catalog::RequirementCatalog,
    config::{Config, ProcessChecklist},
};

#[test]
fn company_incorporation_has_five_documents_in_order() {
    let catalog = RequirementCatalog::from_config(&Config::default());
    let docs = catalog.required_documents_for("Company Incorporation");

    assert_eq!(docs.len(), 5);
    assert_eq!(docs[0], "Articles of Association");
    assert_eq!(docs[4], "Register of Members and Directors");
}

#[test]
fn unknown_process_is_empty_not_an_error() {
    let catalog = RequirementCatalog::from_config(&Config::default());
    assert!(catalog.required_documents_for("Licensing").is_empty());
    assert!(catalog.required_documents_for("").is_empty());
}

#[test]
fn process_for_uses_first_matching_checklist() {
    let catalog = RequirementCatalog::new(vec![
        ProcessChecklist {
            name: "Company Incorporation".into(),
            documents: vec!["Articles of Association".into()],
        },
        ProcessChecklist {
            name: "Branch Registration".into(),
            documents: vec![
                "Articles of Association".into(),
                "Parent Company Resolution".into(),
            ],
        },
    ]);

    assert_eq!(
        catalog.process_for("Articles of Association"),
        Some("Company Incorporation")
    );
    assert_eq!(
        catalog.process_for("Parent Company Resolution"),
        Some("Branch Registration")
    );
    assert_eq!(catalog.process_for("Lease"), None);
}
