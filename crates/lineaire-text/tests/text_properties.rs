use lineaire_text::{
    tokenize, Annotation, AnnotationColor, AnnotationKind, AnnotationStore, DisplayedStanza,
    IndexMode, OverlaySettings, OverlayStore, Point, TokenId,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn stanzas() -> impl Strategy<Value = Vec<DisplayedStanza>> {
    proptest::collection::vec(
        proptest::collection::vec("[a-zé' ,.;!-]{0,30}", 0..5),
        0..5,
    )
    .prop_map(|poem| {
        poem.into_iter()
            .enumerate()
            .map(|(i, lines)| DisplayedStanza::new(i, lines))
            .collect()
    })
}

fn kind() -> impl Strategy<Value = AnnotationKind> {
    prop_oneof![Just(AnnotationKind::Highlight), Just(AnnotationKind::Underline)]
}

fn color() -> impl Strategy<Value = AnnotationColor> {
    proptest::sample::select(AnnotationColor::ALL.to_vec())
}

fn ops() -> impl Strategy<Value = Vec<(u8, AnnotationKind, AnnotationColor)>> {
    proptest::collection::vec((0u8..4, kind(), color()), 0..40)
}

fn snapshot(store: &AnnotationStore) -> Vec<Annotation> {
    store.iter().cloned().collect()
}

fn token(n: u8) -> TokenId {
    TokenId::new(0, "mot", usize::from(n))
}

proptest! {
    #[test]
    fn prop_token_ids_unique_and_deterministic(poem in stanzas()) {
        let first = tokenize(&poem, IndexMode::Global);
        let second = tokenize(&poem, IndexMode::Global);

        let ids: HashSet<&TokenId> = first.tokens().iter().map(|t| &t.id).collect();
        prop_assert_eq!(ids.len(), first.len());

        let a: Vec<&TokenId> = first.tokens().iter().map(|t| &t.id).collect();
        let b: Vec<&TokenId> = second.tokens().iter().map(|t| &t.id).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_render_reproduces_input(poem in stanzas()) {
        let expected = poem
            .iter()
            .map(|s| s.lines.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n");
        prop_assert_eq!(tokenize(&poem, IndexMode::Global).render_plain(), expected);
    }

    #[test]
    fn prop_undo_everything_returns_to_empty(ops in ops()) {
        let mut store = AnnotationStore::new();
        for (t, k, c) in &ops {
            store.apply_annotation(&token(*t), *k, *c);
        }
        for _ in 0..ops.len() {
            store.undo();
        }
        prop_assert!(store.is_empty());
        prop_assert!(!store.can_undo());
    }

    #[test]
    fn prop_undo_redo_replay_restores_final_state(
        ops in ops(),
        moves in proptest::collection::vec(any::<bool>(), 0..60),
    ) {
        let mut store = AnnotationStore::new();
        for (t, k, c) in &ops {
            store.apply_annotation(&token(*t), *k, *c);
        }
        let expected = snapshot(&store);

        for undo in moves {
            if undo {
                store.undo();
            } else {
                store.redo();
            }
        }
        while store.redo() {}

        prop_assert_eq!(snapshot(&store), expected);
        prop_assert_eq!(store.history().len(), ops.len());
    }

    #[test]
    fn prop_eraser_removes_iff_a_point_is_in_radius(
        strokes in proptest::collection::vec(
            proptest::collection::vec((-50.0f32..50.0, -50.0f32..50.0), 1..6),
            0..8,
        ),
        at in (-50.0f32..50.0, -50.0f32..50.0),
    ) {
        let settings = OverlaySettings::default();
        let radius = settings.erase_radius;
        let mut store = OverlayStore::new(settings);
        for points in &strokes {
            store.begin_stroke(Point::new(points[0].0, points[0].1));
            for &(x, y) in &points[1..] {
                store.extend_stroke(Point::new(x, y));
            }
            store.end_stroke();
        }

        let at = Point::new(at.0, at.1);
        let survivors: Vec<_> = strokes
            .iter()
            .filter(|pts| pts.iter().all(|&(x, y)| Point::new(x, y).distance_to(&at) > radius))
            .cloned()
            .collect();

        store.erase_at(at);
        let left: Vec<Vec<(f32, f32)>> = store
            .strokes()
            .iter()
            .map(|s| s.points.iter().map(|p| (p.x, p.y)).collect())
            .collect();
        prop_assert_eq!(left, survivors);
    }
}
