use manuscript_core::tree::MAX_HANDLE_ATTEMPTS;
use manuscript_core::{
    Handle, Item, ItemClass, ItemLayout, ItemRecord, ItemType, ProjectTree, TreeError, TreeEvent,
};
use rand::rngs::mock::StepRng;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

fn h(bits: u64) -> Handle {
    Handle::from_bits(bits)
}

fn record(
    handle: u64,
    parent: Option<u64>,
    item_type: ItemType,
    class: ItemClass,
    layout: ItemLayout,
    name: &str,
) -> ItemRecord {
    ItemRecord {
        handle: h(handle).to_string(),
        parent: parent.map(|bits| h(bits).to_string()),
        item_type,
        class,
        layout,
        name: name.to_string(),
        word_count: 0,
    }
}

fn root(handle: u64, class: ItemClass, name: &str) -> ItemRecord {
    record(handle, None, ItemType::Root, class, ItemLayout::NoLayout, name)
}

fn handles_in_tree_order(tree: &ProjectTree) -> Vec<Handle> {
    tree.iter().map(|item| item.handle.clone()).collect()
}

#[test]
fn create_builds_hierarchy_and_applies_root_defaults() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    let chapter = tree
        .create("Chapter One", Some(&novel), ItemType::Folder, ItemClass::NoClass)
        .unwrap();
    let scene = tree
        .create("Scene", Some(&chapter), ItemType::File, ItemClass::NoClass)
        .unwrap();

    assert_eq!(tree.len(), 3);
    assert!(tree.contains(&scene));
    assert!(tree.check_type(&chapter, ItemType::Folder));
    assert!(!tree.check_type(&chapter, ItemType::File));
    assert!(tree.is_changed());

    let item = tree.get(&scene).unwrap();
    assert_eq!(item.root.as_ref(), Some(&novel));
    assert_eq!(item.item_class, ItemClass::Novel);
    assert_eq!(item.item_layout, ItemLayout::Document);
    assert_eq!(tree.nodes().children_of(&chapter), &[scene.clone()]);
    assert_eq!(handles_in_tree_order(&tree), vec![novel, chapter, scene]);
}

#[test]
fn create_under_unknown_parent_is_rejected_without_side_effects() {
    let mut tree = ProjectTree::new();
    let err = tree
        .create("Lost", Some(&h(0xabc)), ItemType::File, ItemClass::Novel)
        .unwrap_err();
    assert!(matches!(err, TreeError::ParentNotFound(parent) if parent == h(0xabc)));
    assert!(tree.is_empty());
    assert!(!tree.is_changed());

    // Roots ignore the parent argument entirely.
    let root = tree
        .create("Plot", Some(&h(0xabc)), ItemType::Root, ItemClass::Plot)
        .unwrap();
    assert_eq!(tree.get(&root).unwrap().parent, None);
}

#[test]
fn append_rejects_duplicate_handle_and_second_trash_root() {
    let mut tree = ProjectTree::new();
    tree.append(Item::new(h(1), "Novel", None, ItemType::Root, ItemClass::Novel))
        .unwrap();
    tree.append(Item::new(h(2), "Trash", None, ItemType::Root, ItemClass::Trash))
        .unwrap();

    let err = tree
        .append(Item::new(h(1), "Again", None, ItemType::Root, ItemClass::Plot))
        .unwrap_err();
    assert!(matches!(err, TreeError::DuplicateHandle(handle) if handle == h(1)));

    let err = tree
        .append(Item::new(h(3), "Bin", None, ItemType::Trash, ItemClass::Trash))
        .unwrap_err();
    match err {
        TreeError::SecondTrashRoot { existing, rejected } => {
            assert_eq!(existing, h(2));
            assert_eq!(rejected, h(3));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(tree.len(), 2);
    assert_eq!(tree.trash_root(), Some(&h(2)));
    assert_eq!(tree.get(&h(1)).unwrap().name, "Novel");
}

#[test]
fn duplicate_copies_item_under_fresh_handle() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    let scene = tree
        .create("Scene", Some(&novel), ItemType::File, ItemClass::Novel)
        .unwrap();
    let other = tree
        .create("Other", Some(&novel), ItemType::File, ItemClass::Novel)
        .unwrap();
    tree.set_word_count(&scene, 42).unwrap();

    let copy = tree.duplicate(&scene).unwrap();
    assert_ne!(copy, scene);
    let copied = tree.get(&copy).unwrap();
    assert_eq!(copied.name, "Scene");
    assert_eq!(copied.parent.as_ref(), Some(&novel));
    assert_eq!(copied.word_count, 42);
    assert_eq!(tree.nodes().children_of(&novel), &[scene, other, copy]);

    let err = tree.duplicate(&h(0xdead)).unwrap_err();
    assert!(matches!(err, TreeError::ItemNotFound(_)));
}

#[test]
fn delete_does_not_cascade_to_descendant_items() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    let chapter = tree
        .create("Chapter", Some(&novel), ItemType::Folder, ItemClass::Novel)
        .unwrap();
    let scene = tree
        .create("Scene", Some(&chapter), ItemType::File, ItemClass::Novel)
        .unwrap();

    let removed = tree.delete(&chapter).unwrap();
    assert_eq!(removed.handle, chapter);
    assert!(!tree.contains(&chapter));
    assert!(tree.contains(&scene));
    assert!(!tree.nodes().contains(&scene));
    assert_eq!(tree.get(&scene).unwrap().parent.as_ref(), Some(&chapter));
    assert!(!tree.update_item_data(&scene).unwrap());

    // The next rebuild detaches the leftover child.
    let summary = tree.build_model();
    assert_eq!(summary.detached, 1);
    assert_eq!(tree.get(&scene).unwrap().parent, None);

    assert!(matches!(
        tree.delete(&chapter).unwrap_err(),
        TreeError::ItemNotFound(_)
    ));
}

#[test]
fn deleting_trash_root_frees_the_slot() {
    let mut tree = ProjectTree::new();
    let trash = tree
        .create("Trash", None, ItemType::Trash, ItemClass::Trash)
        .unwrap();
    assert_eq!(tree.trash_root(), Some(&trash));

    tree.delete(&trash).unwrap();
    assert_eq!(tree.trash_root(), None);
    tree.create("Trash", None, ItemType::Root, ItemClass::Trash)
        .unwrap();
}

#[test]
fn pack_of_unpack_round_trips_children_listed_before_parents() {
    let mut scene = record(
        0x13,
        Some(0x12),
        ItemType::File,
        ItemClass::Novel,
        ItemLayout::Document,
        "Scene",
    );
    scene.word_count = 1200;
    let records = vec![
        scene,
        record(
            0x12,
            Some(0x11),
            ItemType::Folder,
            ItemClass::Novel,
            ItemLayout::NoLayout,
            "Chapter",
        ),
        root(0x11, ItemClass::Novel, "Novel"),
        record(
            0x22,
            Some(0x21),
            ItemType::File,
            ItemClass::Plot,
            ItemLayout::Note,
            "Main Plot",
        ),
        root(0x21, ItemClass::Plot, "Plot"),
        root(0x31, ItemClass::Trash, "Trash"),
    ];

    let mut tree = ProjectTree::new();
    let summary = tree.unpack(&records);
    assert_eq!(summary.admitted, 6);
    assert_eq!(summary.rejected, 0);
    assert_eq!(tree.nodes().len(), 6);
    assert_eq!(tree.trash_root(), Some(&h(0x31)));
    assert!(!tree.is_changed());

    assert_eq!(tree.pack(), records);
    assert_eq!(
        handles_in_tree_order(&tree),
        vec![h(0x11), h(0x12), h(0x13), h(0x21), h(0x22), h(0x31)]
    );
}

#[test]
fn builder_keeps_original_list_order_for_siblings() {
    // `4` is listed before its parent `3` and only resolves in a later pass.
    let records = vec![
        root(1, ItemClass::Novel, "Novel"),
        record(
            4,
            Some(3),
            ItemType::File,
            ItemClass::Novel,
            ItemLayout::Document,
            "Late",
        ),
        record(
            2,
            Some(1),
            ItemType::Folder,
            ItemClass::Novel,
            ItemLayout::NoLayout,
            "Part",
        ),
        record(
            5,
            Some(2),
            ItemType::File,
            ItemClass::Novel,
            ItemLayout::Document,
            "Early",
        ),
        record(
            3,
            Some(1),
            ItemType::Folder,
            ItemClass::Novel,
            ItemLayout::NoLayout,
            "Other Part",
        ),
        record(
            6,
            Some(2),
            ItemType::File,
            ItemClass::Novel,
            ItemLayout::Document,
            "Middle",
        ),
    ];

    let mut tree = ProjectTree::new();
    tree.unpack(&records);

    assert_eq!(tree.nodes().top_level(), &[h(1)]);
    assert_eq!(tree.nodes().children_of(&h(1)), &[h(2), h(3)]);
    assert_eq!(tree.nodes().children_of(&h(2)), &[h(5), h(6)]);
    assert_eq!(tree.nodes().children_of(&h(3)), &[h(4)]);
    for handle in [h(2), h(3)] {
        assert_eq!(tree.nodes().get(&handle).unwrap().parent(), Some(&h(1)));
    }
    assert_eq!(
        handles_in_tree_order(&tree),
        vec![h(1), h(2), h(5), h(6), h(3), h(4)]
    );
}

#[test]
fn unpack_rejects_malformed_and_duplicate_records() {
    let mut bad_parent = record(
        5,
        None,
        ItemType::File,
        ItemClass::Novel,
        ItemLayout::Document,
        "Bad Parent",
    );
    bad_parent.parent = Some("nope".to_string());
    let mut bad_handle = root(6, ItemClass::Plot, "Bad Handle");
    bad_handle.handle = "XYZ".to_string();

    let records = vec![
        root(1, ItemClass::Novel, "Novel"),
        root(1, ItemClass::Plot, "Duplicate"),
        bad_handle,
        bad_parent,
        root(2, ItemClass::Trash, "Trash"),
        record(
            3,
            None,
            ItemType::Trash,
            ItemClass::Trash,
            ItemLayout::NoLayout,
            "Trash Again",
        ),
    ];

    let mut tree = ProjectTree::new();
    let summary = tree.unpack(&records);
    assert_eq!(summary.admitted, 2);
    assert_eq!(summary.rejected, 4);
    assert_eq!(tree.handles(), vec![h(1), h(2)]);
    assert_eq!(tree.get(&h(1)).unwrap().name, "Novel");
    assert_eq!(tree.trash_root(), Some(&h(2)));
}

#[test]
fn unpack_detaches_orphans_and_cycles() {
    let mut rooted_with_parent = root(1, ItemClass::Novel, "Novel");
    rooted_with_parent.parent = Some(h(0x77).to_string());
    let records = vec![
        rooted_with_parent,
        record(
            2,
            Some(0xfff),
            ItemType::File,
            ItemClass::Novel,
            ItemLayout::Document,
            "Orphan",
        ),
        record(
            3,
            Some(4),
            ItemType::Folder,
            ItemClass::Novel,
            ItemLayout::NoLayout,
            "Loop A",
        ),
        record(
            4,
            Some(3),
            ItemType::Folder,
            ItemClass::Novel,
            ItemLayout::NoLayout,
            "Loop B",
        ),
    ];

    let mut tree = ProjectTree::new();
    let summary = tree.unpack(&records);
    assert_eq!(summary.admitted, 4);
    assert!(tree.is_changed());

    assert_eq!(tree.nodes().len(), 1);
    for bits in 1..=4 {
        assert_eq!(tree.get(&h(bits)).unwrap().parent, None);
    }
    assert!(tree.update_item_data(&h(1)).unwrap());
    assert!(!tree.update_item_data(&h(3)).unwrap());
    assert!(tree.pack().iter().all(|record| record.parent.is_none()));
}

#[test]
fn unpack_replaces_previous_content() {
    let mut tree = ProjectTree::new();
    let old = tree
        .create("Old", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    tree.unpack(&[root(9, ItemClass::Plot, "Plot")]);
    assert!(!tree.contains(&old));
    assert_eq!(tree.handles(), vec![h(9)]);
}

#[test]
fn generated_handles_are_unique_across_ten_thousand_items() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    let mut seen = HashSet::from([novel.clone()]);
    for index in 0..10_000 {
        let handle = tree
            .create(
                &format!("Scene {index}"),
                Some(&novel),
                ItemType::File,
                ItemClass::Novel,
            )
            .unwrap();
        assert_eq!(handle.as_str().len(), 13);
        assert!(seen.insert(handle));
    }
    assert_eq!(tree.len(), 10_001);
}

#[test]
fn handle_generation_retries_past_collisions() {
    let mut tree = ProjectTree::with_rng(StepRng::new(0, 1));
    for bits in 0..10 {
        tree.append(Item::new(
            h(bits),
            format!("Root {bits}"),
            None,
            ItemType::Root,
            ItemClass::Custom,
        ))
        .unwrap();
    }

    let handle = tree
        .create("Fresh", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    assert_eq!(handle.as_str(), "000000000000a");
}

#[test]
fn handle_generation_gives_up_after_bounded_attempts() {
    let mut tree = ProjectTree::with_rng(StepRng::new(0, 0));
    tree.append(Item::new(h(0), "Taken", None, ItemType::Root, ItemClass::Novel))
        .unwrap();
    tree.clear_changed();

    let err = tree
        .create("Never", None, ItemType::Root, ItemClass::Novel)
        .unwrap_err();
    assert!(matches!(
        err,
        TreeError::HandleSpaceExhausted { attempts } if attempts == MAX_HANDLE_ATTEMPTS
    ));
    assert_eq!(tree.len(), 1);
    assert!(!tree.is_changed());
}

#[test]
fn is_trash_covers_root_children_and_cached_descendants() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    let kept = tree
        .create("Kept", Some(&novel), ItemType::File, ItemClass::Novel)
        .unwrap();
    let trash = tree
        .create("Trash", None, ItemType::Root, ItemClass::Trash)
        .unwrap();
    let binned = tree
        .create("Old Part", Some(&trash), ItemType::Folder, ItemClass::Plot)
        .unwrap();
    let deep = tree
        .create("Old Scene", Some(&binned), ItemType::File, ItemClass::Plot)
        .unwrap();

    assert!(tree.is_trash(&trash));
    assert!(tree.is_trash(&binned));
    assert!(tree.is_trash(&deep));
    assert!(!tree.is_trash(&novel));
    assert!(!tree.is_trash(&kept));
    assert!(!tree.is_trash(&h(0xbad)));

    // Trashed items keep their own class so they can be restored.
    assert_eq!(tree.get(&deep).unwrap().item_class, ItemClass::Plot);
    assert_eq!(tree.get(&deep).unwrap().item_layout, ItemLayout::Note);
}

#[test]
fn is_trash_is_false_without_a_trash_root() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    assert!(!tree.is_trash(&novel));
}

#[test]
fn sum_words_splits_totals_by_layout() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    let plot = tree
        .create("Plot", None, ItemType::Root, ItemClass::Plot)
        .unwrap();
    let first = tree
        .create("One", Some(&novel), ItemType::File, ItemClass::NoClass)
        .unwrap();
    let second = tree
        .create("Two", Some(&novel), ItemType::File, ItemClass::NoClass)
        .unwrap();
    let note = tree
        .create("Idea", Some(&plot), ItemType::File, ItemClass::NoClass)
        .unwrap();

    tree.set_word_count(&first, 100).unwrap();
    tree.set_word_count(&second, 50).unwrap();
    tree.set_word_count(&note, 30).unwrap();

    assert_eq!(tree.sum_words(), (150, 30));
    assert_eq!(tree.nodes().get(&novel).unwrap().word_total(), 150);
    assert_eq!(tree.nodes().get(&plot).unwrap().word_total(), 30);
}

#[test]
fn huge_word_counts_saturate_instead_of_overflowing() {
    let mut records = vec![root(0x1, ItemClass::Novel, "Novel")];
    for bits in 0x2..=0x4 {
        let mut scene = record(
            bits,
            Some(0x1),
            ItemType::File,
            ItemClass::Novel,
            ItemLayout::Document,
            "Scene",
        );
        scene.word_count = i64::MAX as u64;
        records.push(scene);
    }

    let mut tree = ProjectTree::new();
    let summary = tree.unpack(&records);
    assert_eq!(summary.admitted, 4);
    assert_eq!(tree.sum_words(), (u64::MAX, 0));
    assert_eq!(tree.nodes().get(&h(0x1)).unwrap().word_total(), u64::MAX);
    assert_eq!(
        tree.nodes().get(&h(0x2)).unwrap().word_total(),
        i64::MAX as u64
    );
}

#[test]
fn item_path_walks_to_root_and_stops_at_missing_ancestor() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    let chapter = tree
        .create("Chapter", Some(&novel), ItemType::Folder, ItemClass::Novel)
        .unwrap();
    let scene = tree
        .create("Scene", Some(&chapter), ItemType::File, ItemClass::Novel)
        .unwrap();

    assert_eq!(
        tree.item_path(&scene).unwrap(),
        vec![scene.clone(), chapter.clone(), novel.clone()]
    );
    assert_eq!(
        tree.item_path_names(&scene).unwrap(),
        vec!["Scene", "Chapter", "Novel"]
    );

    tree.delete(&chapter).unwrap();
    assert_eq!(tree.item_path(&scene).unwrap(), vec![scene.clone()]);
    assert!(tree.item_path(&chapter).unwrap().is_empty());
}

#[test]
fn root_queries_follow_tree_order() {
    let mut tree = ProjectTree::new();
    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    let plot = tree
        .create("Plot", None, ItemType::Root, ItemClass::Plot)
        .unwrap();
    let second_novel = tree
        .create("Sequel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    tree.create("Chapter", Some(&novel), ItemType::Folder, ItemClass::Novel)
        .unwrap();

    assert_eq!(tree.find_root(ItemClass::Novel), Some(&novel));
    assert_eq!(tree.find_root(ItemClass::Plot), Some(&plot));
    assert_eq!(tree.find_root(ItemClass::World), None);

    let novels: Vec<&Handle> = tree
        .iter_roots(Some(ItemClass::Novel))
        .map(|(handle, _)| handle)
        .collect();
    assert_eq!(novels, vec![&novel, &second_novel]);
    assert_eq!(tree.iter_roots(None).count(), 3);
    assert_eq!(
        tree.root_classes().into_iter().collect::<Vec<_>>(),
        vec![ItemClass::Novel, ItemClass::Plot]
    );
}

#[test]
fn observers_receive_mutation_events() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let mut tree = ProjectTree::new();
    tree.subscribe(move |event: &TreeEvent| sink.borrow_mut().push(event.clone()));

    let novel = tree
        .create("Novel", None, ItemType::Root, ItemClass::Novel)
        .unwrap();
    tree.rename(&novel, "Draft").unwrap();
    tree.delete(&novel).unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            TreeEvent::ItemAdded(novel.clone()),
            TreeEvent::Changed,
            TreeEvent::ItemUpdated(novel.clone()),
            TreeEvent::Changed,
            TreeEvent::ItemRemoved(novel.clone()),
            TreeEvent::Changed,
        ]
    );

    events.borrow_mut().clear();
    tree.unpack(&[root(1, ItemClass::Novel, "Novel")]);
    assert_eq!(
        *events.borrow(),
        vec![TreeEvent::ModelRebuilt {
            attached: 1,
            detached: 0
        }]
    );
}

#[test]
fn refresh_items_notifies_only_attached_handles() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let mut tree = ProjectTree::new();
    tree.unpack(&[root(1, ItemClass::Novel, "Novel")]);
    tree.subscribe(move |event: &TreeEvent| sink.borrow_mut().push(event.clone()));

    tree.refresh_items(&[h(1), h(2)]);
    assert_eq!(*events.borrow(), vec![TreeEvent::ItemUpdated(h(1))]);
}

#[test]
fn rename_and_word_count_reject_unknown_items() {
    let mut tree = ProjectTree::new();
    assert!(matches!(
        tree.rename(&h(1), "Nope").unwrap_err(),
        TreeError::ItemNotFound(_)
    ));
    assert!(matches!(
        tree.set_word_count(&h(1), 5).unwrap_err(),
        TreeError::ItemNotFound(_)
    ));
}

#[test]
fn item_record_uses_stable_wire_names() {
    let record = record(
        0xabc,
        Some(0x1),
        ItemType::File,
        ItemClass::Novel,
        ItemLayout::Document,
        "Scene",
    );
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "handle": "0000000000abc",
            "parent": "0000000000001",
            "type": "FILE",
            "class": "NOVEL",
            "layout": "DOCUMENT",
            "name": "Scene",
            "word_count": 0
        })
    );

    let text = serde_json::to_string(&record).unwrap();
    let keys: Vec<usize> = [
        "handle",
        "parent",
        "type",
        "class",
        "layout",
        "name",
        "word_count",
    ]
    .iter()
    .map(|key| text.find(&format!("\"{key}\"")).unwrap())
    .collect();
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn wire_records_carry_unvalidated_handle_text() {
    let records: Vec<ItemRecord> = serde_json::from_value(serde_json::json!([
        {
            "handle": "0000000000001",
            "parent": null,
            "type": "ROOT",
            "class": "NOVEL",
            "layout": "NO_LAYOUT",
            "name": "Novel",
            "word_count": 0
        },
        {
            "handle": "Not-A-Handle",
            "parent": "0000000000001",
            "type": "FILE",
            "class": "NOVEL",
            "layout": "DOCUMENT",
            "name": "Bad",
            "word_count": 0
        }
    ]))
    .unwrap();
    assert_eq!(records[1].handle, "Not-A-Handle");

    let mut tree = ProjectTree::new();
    let summary = tree.unpack(&records);
    assert_eq!((summary.admitted, summary.rejected), (1, 1));
    assert_eq!(tree.pack(), records[..1].to_vec());
}
