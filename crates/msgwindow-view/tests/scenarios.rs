use hashbrown::HashMap;

use msgwindow_types::{
    Anchor, ConversationId, MessageId, MessageIndex, Namespace, NamespaceCapabilities,
    PartitionKey, SEQUENCE_ID_MAX, SEQUENCE_ID_MIN, StatisticsFlags, TagMask,
};
use msgwindow_view::{
    AnchorRequest, CombinedLocation, GroupInfo, HistoryView, HoleSet, IntermediateMessage, Media,
    MediaId, MemoryHistoryStore, ReadState, Sample, ViewConfig, ViewSnapshot,
};

const CONVERSATION: ConversationId = ConversationId(1);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn partition(namespace: u32) -> PartitionKey {
    PartitionKey::new(CONVERSATION, Namespace(namespace))
}

fn index_in(namespace: u32, id: u32) -> MessageIndex {
    MessageIndex::new(MessageId::new(partition(namespace), id), id)
}

fn index(id: u32) -> MessageIndex {
    index_in(0, id)
}

fn message(id: u32) -> IntermediateMessage {
    IntermediateMessage::new(index(id), format!("message {id}"))
}

fn store_with(ids: &[u32]) -> MemoryHistoryStore {
    let mut store = MemoryHistoryStore::new();
    for id in ids {
        store.insert_message(message(*id));
    }
    store
}

fn at(id: u32) -> AnchorRequest {
    AnchorRequest::Message {
        id: MessageId::new(partition(0), id),
    }
}

fn config(anchor: AnchorRequest, half_limit: usize) -> ViewConfig {
    ViewConfig::new(anchor, [CONVERSATION]).with_half_limit(half_limit)
}

fn holeable() -> NamespaceCapabilities {
    NamespaceCapabilities::with_holeable([Namespace(0)])
}

fn open(store: &MemoryHistoryStore, config: ViewConfig) -> HistoryView {
    HistoryView::open(store, config).expect("valid view config")
}

fn loaded_sample(view: &mut HistoryView, store: &MemoryHistoryStore) -> Sample {
    match view.sample(store) {
        ViewSnapshot::Loaded(sample) => sample,
        ViewSnapshot::Loading { hole } => panic!("view still loading, blocked on {hole:?}"),
    }
}

fn ids(sample: &Sample) -> Vec<u32> {
    sample
        .entries
        .iter()
        .map(|entry| entry.message.index.id)
        .collect()
}

#[test]
fn single_partition_without_holes() {
    init_tracing();
    let store = store_with(&[10, 20, 30, 40, 50]);
    let mut view = open(&store, config(at(30), 2));
    assert!(!view.is_loaded(), "message anchors resolve on first sample");

    let sample = loaded_sample(&mut view, &store);
    assert_eq!(sample.anchor, Anchor::At(index(30)));
    assert_eq!(ids(&sample), vec![20, 30, 40, 50]);
    assert!(sample.is_complete(), "case=no_holes sample={sample:?}");

    let window = view
        .loaded()
        .and_then(|loaded| loaded.window(partition(0)))
        .expect("partition window");
    let lower: Vec<u32> = window
        .lower_or_at_anchor()
        .iter()
        .map(|entry| entry.index().id)
        .collect();
    let higher: Vec<u32> = window
        .higher_than_anchor()
        .iter()
        .map(|entry| entry.index().id)
        .collect();
    assert_eq!(lower, vec![20, 30]);
    assert_eq!(higher, vec![40, 50]);
}

#[test]
fn hole_below_short_window_blocks_extension() {
    init_tracing();
    let mut store = store_with(&[20, 30, 40, 50]);
    store.insert_hole(partition(0), 1..=19);
    let mut view = open(&store, config(at(30), 2).with_capabilities(holeable()));

    let sample = loaded_sample(&mut view, &store);
    assert_eq!(ids(&sample), vec![20, 30, 40, 50]);
    assert!(sample.holes_to_lower, "case=hole_below sample={sample:?}");
    assert!(!sample.holes_to_higher);

    let hole = sample.hole.clone().expect("hole below 20 requested");
    assert_eq!(hole.partition, partition(0));
    assert_eq!(hole.start_id, 19, "nearest missing id below 20");
    assert_eq!(hole.end_id, Some(SEQUENCE_ID_MIN));
    assert_eq!(hole.id_ranges, HoleSet::from_ranges([1..=19]));
    assert_eq!(ViewSnapshot::Loaded(sample).hole(), Some(&hole));
}

#[test]
fn fetched_hole_clears_request_but_full_side_keeps_its_entries() {
    init_tracing();
    let mut store = store_with(&[20, 30, 40, 50]);
    store.insert_hole(partition(0), 1..=19);
    let mut view = open(&store, config(at(30), 2).with_capabilities(holeable()));
    assert!(loaded_sample(&mut view, &store).hole.is_some());

    store.insert_message(message(15));
    store.remove_hole(partition(0), 1..=19);
    assert!(
        !view.add(message(15)),
        "case=beyond_full_side 15 is farther than a full lower side"
    );
    assert!(view.remove_hole(partition(0), 1..=19));

    let sample = loaded_sample(&mut view, &store);
    assert_eq!(ids(&sample), vec![20, 30, 40, 50]);
    assert!(sample.is_complete(), "case=hole_fetched sample={sample:?}");
}

#[test]
fn anchor_inside_hole_waits_for_fetch() {
    init_tracing();
    let mut store = store_with(&[10, 30]);
    store.insert_hole(partition(0), 20..=29);
    let mut view = open(&store, config(at(25), 2).with_capabilities(holeable()));

    let ViewSnapshot::Loading { hole } = view.sample(&store) else {
        panic!("anchor inside a hole cannot load");
    };
    assert_eq!(hole.start_id, 25);
    assert_eq!(hole.end_id, None);
    assert_eq!(hole.id_ranges, HoleSet::from_ranges([20..=29]));
    assert!(!view.is_loaded());
    assert!(!view.add(message(25)), "case=mutation_while_loading");

    store.insert_message(message(25));
    store.remove_hole(partition(0), 20..=29);
    assert!(view.remove_hole(partition(0), 20..=29));

    let sample = loaded_sample(&mut view, &store);
    assert_eq!(sample.anchor, Anchor::At(index(25)));
    assert_eq!(ids(&sample), vec![10, 25, 30]);
    assert!(sample.is_complete());
}

#[test]
fn partitions_merge_nearest_first() {
    init_tracing();
    let mut store = MemoryHistoryStore::new();
    for (namespace, id) in [(0, 10), (0, 30), (1, 20)] {
        store.insert_message(IntermediateMessage::new(index_in(namespace, id), "m"));
    }
    let mut view = open(&store, config(AnchorRequest::UpperBound, 2));
    assert!(view.is_loaded(), "bound anchors load immediately");
    assert_eq!(view.partitions(), &[partition(0), partition(1)]);

    let sample = loaded_sample(&mut view, &store);
    let merged: Vec<(u32, u32)> = sample
        .entries
        .iter()
        .map(|entry| (entry.message.index.partition.namespace.0, entry.message.index.id))
        .collect();
    assert_eq!(merged, vec![(1, 20), (0, 30)]);
}

#[test]
fn repeated_sample_is_stable() {
    let store = store_with(&[10, 20, 30, 40, 50]);
    let mut view = open(
        &store,
        config(at(30), 2).with_statistics(StatisticsFlags::COMBINED_LOCATION),
    );
    let first = view.sample(&store);
    let second = view.sample(&store);
    assert_eq!(first, second);
}

#[test]
fn combined_location_counts_whole_partition() {
    let store = store_with(&[10, 20, 30, 40, 50]);
    let mut view = open(
        &store,
        config(at(30), 2).with_statistics(StatisticsFlags::COMBINED_LOCATION),
    );
    let sample = loaded_sample(&mut view, &store);
    let locations: Vec<_> = sample
        .entries
        .iter()
        .map(|entry| entry.location.and_then(|location| location.combined))
        .collect();
    let expected: Vec<_> = (1..=4)
        .map(|index| Some(CombinedLocation { index, count: 5 }))
        .collect();
    assert_eq!(locations, expected);
}

#[test]
fn insert_and_remove_reshape_window() {
    init_tracing();
    let mut store = store_with(&[10, 20, 30, 40, 50]);
    let mut view = open(&store, config(at(30), 2));
    loaded_sample(&mut view, &store);

    store.insert_message(message(35));
    assert!(view.add(message(35)));
    assert_eq!(ids(&loaded_sample(&mut view, &store)), vec![20, 30, 35, 40]);
    assert!(!view.add(message(35)), "case=duplicate_insert_dropped");

    store.remove_message(index(35).message_id());
    assert!(view.remove(&index(35)));
    assert_eq!(ids(&loaded_sample(&mut view, &store)), vec![20, 30, 40, 50]);

    store.remove_message(index(20).message_id());
    assert!(view.remove(&index(20)));
    assert_eq!(ids(&loaded_sample(&mut view, &store)), vec![10, 30, 40, 50]);
    assert!(!view.remove(&index(20)), "case=remove_absent");
}

#[test]
fn timestamp_update_moves_entry() {
    let mut store = store_with(&[10, 20, 30, 40, 50]);
    let mut view = open(&store, config(at(30), 2));
    loaded_sample(&mut view, &store);

    store.update_timestamp(index(20).message_id(), 45);
    assert!(view.update_timestamp(&index(20), 45));
    let sample = loaded_sample(&mut view, &store);
    let timestamps: Vec<u32> = sample
        .entries
        .iter()
        .map(|entry| entry.message.index.timestamp)
        .collect();
    assert_eq!(timestamps, vec![10, 30, 40, 45]);
}

#[test]
fn metadata_updates_reach_rendered_entries() {
    let mut store = MemoryHistoryStore::new();
    store.set_media(Media {
        id: Some(MediaId(1)),
        payload: vec![1, 2, 3],
    });
    for id in [10, 20, 30] {
        store.insert_message(message(id));
    }
    store.insert_message(message(40).with_media([MediaId(1)]));
    let mut view = open(&store, config(AnchorRequest::UpperBound, 3));
    let sample = loaded_sample(&mut view, &store);
    let forty = sample.entries.last().expect("newest entry");
    assert_eq!(forty.message.media.len(), 1);

    let group = HashMap::from([(index(30).message_id(), Some(GroupInfo { stable_id: 7 }))]);
    assert!(view.update_group_info(&group));
    assert!(!view.update_group_info(&group), "case=group_info_unchanged");

    assert!(view.update_embedded_media(&index(20), vec![9]));
    assert!(view.update_media(&HashMap::from([(MediaId(1), None)])));

    let sample = loaded_sample(&mut view, &store);
    let by_id = |id: u32| {
        sample
            .entries
            .iter()
            .find(|entry| entry.message.index.id == id)
            .map(|entry| &entry.message)
            .expect("entry in sample")
    };
    assert_eq!(by_id(30).group_info, Some(GroupInfo { stable_id: 7 }));
    assert_eq!(by_id(20).embedded_media, Some(Media::embedded(vec![9])));
    assert!(by_id(40).media.is_empty(), "case=media_deleted");
}

#[test]
fn first_unread_starts_after_read_position() {
    let mut store = store_with(&[10, 20, 30, 40]);
    store.set_read_state(
        CONVERSATION,
        ReadState {
            namespace: Namespace(0),
            max_read_id: 20,
            unread_count: 2,
        },
    );
    let mut view = open(&store, config(AnchorRequest::FirstUnread, 2));
    let sample = loaded_sample(&mut view, &store);
    assert_eq!(sample.anchor, Anchor::At(index(30)));

    store.set_read_state(
        CONVERSATION,
        ReadState {
            namespace: Namespace(0),
            max_read_id: 40,
            unread_count: 0,
        },
    );
    let view = open(&store, config(AnchorRequest::FirstUnread, 2));
    assert_eq!(view.anchor(), Some(Anchor::UpperBound), "case=all_read");
}

#[test]
fn jump_to_reopens_at_new_anchor() {
    let store = store_with(&[10, 20, 30, 40, 50]);
    let mut view = open(&store, config(at(30), 2));
    loaded_sample(&mut view, &store);

    view.jump_to(&store, AnchorRequest::LowerBound)
        .expect("valid anchor");
    assert_eq!(view.anchor(), Some(Anchor::LowerBound));
    assert_eq!(ids(&loaded_sample(&mut view, &store)), vec![10, 20]);

    let outside = AnchorRequest::Message {
        id: MessageId::new(PartitionKey::new(ConversationId(9), Namespace(0)), 1),
    };
    let err = view.jump_to(&store, outside).expect_err("anchor outside scopes");
    assert_eq!(err.kind(), "invalid_config");
}

#[test]
fn tag_filter_limits_window() {
    let mut store = MemoryHistoryStore::new();
    for id in [10, 20, 30, 40] {
        let tags = if id % 20 == 0 { TagMask::PHOTO } else { TagMask::empty() };
        store.insert_message(message(id).with_tags(tags));
    }
    let mut view = open(
        &store,
        config(AnchorRequest::UpperBound, 3).with_tag(TagMask::PHOTO),
    );
    assert_eq!(ids(&loaded_sample(&mut view, &store)), vec![20, 40]);
    assert!(!view.add(message(50)), "case=untagged_insert");
}

#[test]
fn hole_edits_ignored_without_capability() {
    let store = store_with(&[10, 20]);
    let mut view = open(&store, config(AnchorRequest::UpperBound, 2));
    assert!(!view.insert_hole(partition(0), 1..=5));
    assert!(loaded_sample(&mut view, &store).is_complete());
}

#[test]
fn snapshot_serializes_with_state_tag() {
    let mut store = store_with(&[10]);
    store.insert_hole(partition(0), 20..=29);
    let mut view = open(&store, config(at(25), 2).with_capabilities(holeable()));
    let value = serde_json::to_value(view.sample(&store)).expect("serialize snapshot");
    assert_eq!(value["state"], "loading");
    assert_eq!(value["hole"]["start_id"], 25);
}

#[test]
fn first_message_of_empty_store_joins_open_view() {
    init_tracing();
    let mut store = MemoryHistoryStore::new();
    let mut view = open(&store, config(AnchorRequest::UpperBound, 2));
    assert!(view.partitions().is_empty());
    assert!(loaded_sample(&mut view, &store).entries.is_empty());

    store.insert_message(message(10));
    assert!(view.add(message(10)), "case=first_message");
    assert_eq!(view.partitions(), &[partition(0)]);

    let sample = loaded_sample(&mut view, &store);
    assert_eq!(ids(&sample), vec![10]);
    assert!(sample.is_complete());
}

#[test]
fn message_in_new_namespace_joins_loaded_view() {
    init_tracing();
    let mut store = store_with(&[10]);
    let mut view = open(&store, config(AnchorRequest::UpperBound, 2));
    assert_eq!(view.partitions(), &[partition(0)]);

    let fresh = IntermediateMessage::new(index_in(1, 20), "new namespace");
    store.insert_message(fresh.clone());
    assert!(view.add(fresh));
    assert_eq!(view.partitions(), &[partition(0), partition(1)]);

    let sample = loaded_sample(&mut view, &store);
    let merged: Vec<(u32, u32)> = sample
        .entries
        .iter()
        .map(|entry| (entry.message.index.partition.namespace.0, entry.message.index.id))
        .collect();
    assert_eq!(merged, vec![(0, 10), (1, 20)]);

    let foreign = PartitionKey::new(ConversationId(2), Namespace(0));
    let outside = IntermediateMessage::new(MessageIndex::new(MessageId::new(foreign, 5), 5), "");
    assert!(!view.add(outside), "case=other_conversation");
    assert_eq!(view.partitions().len(), 2);
}

#[test]
fn hole_in_new_holeable_namespace_is_requested() {
    init_tracing();
    let store = store_with(&[10, 20]);
    let capabilities = NamespaceCapabilities::with_holeable([Namespace(0), Namespace(1)]);
    let mut view = open(
        &store,
        config(AnchorRequest::UpperBound, 2).with_capabilities(capabilities),
    );
    assert!(view.insert_hole(partition(1), 1..=5));
    assert_eq!(view.partitions(), &[partition(0), partition(1)]);

    let sample = loaded_sample(&mut view, &store);
    assert!(sample.holes_to_lower);
    let hole = sample.hole.expect("hole in the new namespace");
    assert_eq!(hole.partition, partition(1));
    assert_eq!(hole.start_id, 5);
    assert_eq!(hole.end_id, Some(SEQUENCE_ID_MIN));
}

#[test]
fn hole_across_anchor_time_in_other_namespace_clips_one_side() {
    init_tracing();
    let mut store = store_with(&[10, 20, 30, 40, 50]);
    for id in [10, 50] {
        store.insert_message(IntermediateMessage::new(index_in(1, id), "other"));
    }
    store.insert_hole(partition(1), 40..=45);
    let capabilities = NamespaceCapabilities::with_holeable([Namespace(1)]);
    let mut view = open(&store, config(at(30), 2).with_capabilities(capabilities));

    let sample = loaded_sample(&mut view, &store);
    assert_eq!(ids(&sample), vec![20, 30], "case=lower_side_kept sample={sample:?}");
    assert!(!sample.holes_to_lower);
    assert!(sample.holes_to_higher);

    let hole = sample.hole.expect("hole after the anchor time");
    assert_eq!(hole.partition, partition(1));
    assert_eq!(hole.start_id, 40);
    assert_eq!(hole.end_id, Some(SEQUENCE_ID_MAX));
}

#[test]
fn hole_before_anchor_time_in_other_namespace_clips_lower_side() {
    init_tracing();
    let mut store = store_with(&[10, 20, 30, 40, 50]);
    for id in [10, 50] {
        store.insert_message(IntermediateMessage::new(index_in(1, id), "other"));
    }
    store.insert_hole(partition(1), 15..=20);
    let capabilities = NamespaceCapabilities::with_holeable([Namespace(1)]);
    let mut view = open(&store, config(at(30), 2).with_capabilities(capabilities));

    let sample = loaded_sample(&mut view, &store);
    assert_eq!(ids(&sample), vec![30, 40, 50], "case=higher_side_kept sample={sample:?}");
    assert!(sample.holes_to_lower);
    assert!(!sample.holes_to_higher);

    let hole = sample.hole.expect("hole before the anchor time");
    assert_eq!(hole.partition, partition(1));
    assert_eq!(hole.start_id, 20);
    assert_eq!(hole.end_id, Some(SEQUENCE_ID_MIN));
}
