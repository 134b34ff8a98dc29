mod common;

use assert_matches::assert_matches;
use common::catalog_item;
use stockroom::domain::{ItemId, WarehouseId};
use stockroom::errors::ServiceError;
use stockroom::events::{Event, EventSender};
use stockroom::services::cart::RequestCart;
use stockroom::services::item_selection::{DraftOrigin, ItemSelectionController};
use stockroom::services::stock::QuantityEdit;

#[test]
fn cart_quantity_edit_is_clamped_to_availability() {
    let mut cart = RequestCart::new();
    let item = catalog_item("a", "Anchor", "W1", 5);
    cart.add_with_quantity(&item, 3).unwrap();

    let edit = cart.set_quantity(&item.id, 10).unwrap();
    assert_eq!(
        edit,
        QuantityEdit::Clamped {
            requested: 10,
            applied: 5
        }
    );
    assert_eq!(cart.get(&item.id).unwrap().quantity, 5);
}

#[test]
fn first_warehouse_change_of_cart_draft_is_silent() {
    let (events, mut rx) = EventSender::channel(8);
    let mut cart = RequestCart::new();
    cart.add(&catalog_item("drill", "Drill", "W1", 10)).unwrap();
    cart.add(&catalog_item("saw", "Saw", "W1", 3)).unwrap();

    let mut selection = ItemSelectionController::seed_from_cart(&cart, Vec::new())
        .with_events(events);
    assert_eq!(selection.rows().len(), 2);
    assert_eq!(selection.warehouse(), Some(&WarehouseId::from("W1")));

    let change = selection.change_warehouse(
        WarehouseId::from("W2"),
        vec![catalog_item("ladder", "Ladder", "W2", 5)],
        &mut cart,
    );
    assert_eq!(change.discarded, 2);
    assert!(!change.warn);
    assert!(selection.is_empty());
    assert!(cart.is_empty());
    assert_eq!(
        selection.origin(),
        DraftOrigin::ExternalCart {
            first_change_pending: false
        }
    );

    let row = selection.add_row();
    selection
        .select(row, &ItemId::from("ladder"), &mut cart)
        .unwrap();
    let change = selection.change_warehouse(
        WarehouseId::from("W3"),
        vec![catalog_item("cable", "Cable", "W3", 50)],
        &mut cart,
    );
    assert_eq!(change.discarded, 1);
    assert!(change.warn);

    let mut warned = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::DraftItemsReset { warned: w, .. } = event {
            warned.push(w);
        }
    }
    assert_eq!(warned, vec![false, true]);
}

#[test]
fn manual_draft_warns_on_every_real_change() {
    let mut cart = RequestCart::new();
    let mut selection = ItemSelectionController::new();

    let first = selection.change_warehouse(
        WarehouseId::from("W1"),
        vec![catalog_item("drill", "Drill", "W1", 10)],
        &mut cart,
    );
    assert_eq!(first.discarded, 0);
    assert!(!first.warn);

    let same = selection.change_warehouse(WarehouseId::from("W1"), Vec::new(), &mut cart);
    assert!(!same.warn);
    assert_eq!(selection.catalog().len(), 1);

    let second = selection.change_warehouse(WarehouseId::from("W2"), Vec::new(), &mut cart);
    assert!(second.warn);
}

#[test]
fn an_item_can_only_be_picked_in_one_row() {
    let mut cart = RequestCart::new();
    let mut selection = ItemSelectionController::new();
    selection.change_warehouse(
        WarehouseId::from("W1"),
        vec![
            catalog_item("drill", "Drill", "W1", 10),
            catalog_item("saw", "Saw", "W1", 3),
            catalog_item("tape", "Tape", "W1", 0),
        ],
        &mut cart,
    );

    let first = selection.add_row();
    let second = selection.add_row();
    selection
        .select(first, &ItemId::from("drill"), &mut cart)
        .unwrap();

    let options: Vec<&str> = selection
        .options(second)
        .into_iter()
        .map(|i| i.id.as_str())
        .collect();
    assert_eq!(options, vec!["saw", "tape"]);
    assert_matches!(
        selection.select(second, &ItemId::from("drill"), &mut cart),
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        selection.select(second, &ItemId::from("tape"), &mut cart),
        Err(ServiceError::InsufficientStock(_))
    );

    selection.set_query(second, "SA").unwrap();
    let options: Vec<&str> = selection
        .options(second)
        .into_iter()
        .map(|i| i.id.as_str())
        .collect();
    assert_eq!(options, vec!["saw"]);

    selection.remove_row(first, &mut cart).unwrap();
    selection.set_query(second, "").unwrap();
    assert_eq!(selection.options(second).len(), 3);
    selection
        .select(second, &ItemId::from("drill"), &mut cart)
        .unwrap();
}

#[test]
fn removing_a_row_drops_the_linked_cart_entry() {
    let mut cart = RequestCart::new();
    let drill = catalog_item("drill", "Drill", "W1", 10);
    cart.add(&drill).unwrap();
    let mut selection = ItemSelectionController::seed_from_cart(&cart, vec![drill.clone()]);

    let row = selection.rows()[0].id;
    selection.set_quantity(row, 0, &mut cart).unwrap();
    assert_eq!(cart.get(&drill.id).unwrap().quantity, 1);

    let removed = selection.remove_row(row, &mut cart).unwrap();
    assert_eq!(removed.map(|e| e.item.id), Some(drill.id));
    assert!(cart.is_empty());
}

#[test]
fn repicking_a_seeded_row_releases_the_original_cart_entry() {
    let (events, mut rx) = EventSender::channel(8);
    let drill = catalog_item("drill", "Drill", "W1", 10);
    let saw = catalog_item("saw", "Saw", "W1", 3);
    let mut cart = RequestCart::new();
    cart.add(&drill).unwrap();

    let mut selection =
        ItemSelectionController::seed_from_cart(&cart, vec![drill.clone(), saw.clone()])
            .with_events(events);
    let row = selection.rows()[0].id;

    // picking the same item again leaves the row and the cart alone
    selection.set_quantity(row, 4, &mut cart).unwrap();
    selection.select(row, &drill.id, &mut cart).unwrap();
    assert_eq!(selection.row(row).unwrap().entry.as_ref().unwrap().quantity, 4);
    assert_eq!(cart.get(&drill.id).unwrap().quantity, 4);

    let entry = selection.select(row, &saw.id, &mut cart).unwrap();
    assert_eq!(entry.item_id(), &saw.id);
    assert!(!cart.contains(&drill.id));

    selection.remove_row(row, &mut cart).unwrap();
    assert!(selection.is_empty());
    assert!(cart.is_empty());

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            Event::CartItemRemoved(drill.id.clone()),
            Event::DraftItemSelected {
                item_id: saw.id.clone(),
                quantity: 1
            },
        ]
    );
}
