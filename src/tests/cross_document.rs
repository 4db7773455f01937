use std::sync::Arc;

use crate::{
    DataPack, EntryContainer, EntryId, EntryTypeDecl, MultiPack, NewEntry, PackError,
    SchemaRegistry, SubEntry,
};

fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new()
        .with(EntryTypeDecl::annotation("Token"))
        .and_then(|r| r.with(EntryTypeDecl::annotation("Sentence")))
        .and_then(|r| r.with(EntryTypeDecl::multi_pack_link("Translation", "Sentence", "Sentence")))
        .and_then(|r| r.with(EntryTypeDecl::multi_pack_group("Cluster", "Token")))
        .unwrap();
    Arc::new(registry)
}

/// Two documents; the second holds 43 tokens so ids 0 through 42 exist.
fn two_documents() -> MultiPack {
    let registry = registry();
    let mut first = DataPack::new("Guten Morgen.", registry.clone());
    first.create_entry(NewEntry::annotation("Sentence", 0, 13)).unwrap();

    let text = "x".repeat(43);
    let mut second = DataPack::new(text, registry.clone());
    for begin in 0..43 {
        second
            .create_entry(NewEntry::annotation("Token", begin, begin + 1))
            .unwrap();
    }

    let mut multi = MultiPack::new(registry);
    multi.add_pack(first);
    multi.add_pack(second);
    multi
}

#[test]
fn sub_entry_from_address() {
    let multi = two_documents();
    let address = SubEntry::from_address(&multi, 1, EntryId::new(42)).unwrap();
    assert_eq!(address.index_key(), (1, EntryId::new(42)));
    assert_eq!(multi.resolve(address).unwrap().span().unwrap().begin(), 42);
}

#[test]
fn sub_entry_from_missing_pack() {
    let multi = two_documents();
    assert_eq!(
        SubEntry::from_address(&multi, 5, EntryId::new(0)).unwrap_err(),
        PackError::IndexOutOfRange {
            pack_index: 5,
            len: 2
        }
    );
}

#[test]
fn sub_entry_from_unknown_id() {
    let multi = two_documents();
    assert!(matches!(
        SubEntry::from_address(&multi, 0, EntryId::new(42)),
        Err(PackError::UnknownId { .. })
    ));
}

#[test]
fn cluster_membership_is_a_set() {
    let mut multi = two_documents();
    let a = SubEntry::new(1, EntryId::new(3));
    let b = SubEntry::new(1, EntryId::new(7));
    let cluster = multi.create_entry(NewEntry::group("Cluster").member(a)).unwrap();

    assert!(!multi.add_member(cluster, a).unwrap());
    assert!(multi.add_member(cluster, b).unwrap());
    assert_eq!(multi.num_members(cluster).unwrap(), 2);

    let members: Vec<SubEntry> = multi
        .get_entry(cluster)
        .unwrap()
        .as_multi_pack_group()
        .unwrap()
        .members()
        .collect();
    assert_eq!(members, vec![a, b]);
    assert_eq!(multi.groups_containing(b, Some("Cluster")).unwrap().len(), 1);
}

#[test]
fn sentence_links_across_documents() {
    let mut multi = two_documents();
    let english = multi.add_pack(DataPack::new("Good morning.", registry()));
    let sentence = multi
        .pack_mut(english)
        .unwrap()
        .create_entry(NewEntry::annotation("Sentence", 0, 13))
        .unwrap();

    let german = SubEntry::from_address(&multi, 0, EntryId::new(0)).unwrap();
    let english = SubEntry::new(english, sentence);
    let link = multi
        .create_entry(NewEntry::link("Translation").parent(german).child(english))
        .unwrap();

    let parent = multi.get_parent(link).unwrap();
    let child = multi.get_child(link).unwrap();
    assert_eq!(multi.pack(0).unwrap().text_of(parent).unwrap(), "Guten Morgen.");
    assert_eq!(multi.pack(2).unwrap().text_of(child).unwrap(), "Good morning.");
    assert_eq!(multi.links_to(english, None).unwrap()[0].id(), link);
}

#[test]
fn token_is_not_a_sentence_across_documents() {
    let mut multi = two_documents();
    let link = multi.create_entry(NewEntry::link("Translation")).unwrap();
    let token = SubEntry::new(1, EntryId::new(0));
    assert!(matches!(
        multi.set_parent(link, token),
        Err(PackError::TypeMismatch { .. })
    ));
    assert!(matches!(
        multi.get_parent(link),
        Err(PackError::IncompleteEntry { .. })
    ));
}
