//! Integration tests for Partyline

use partyline::{
    create_global_store, create_global_store_with_reducer, patchable, Context, GlobalStores,
    Owner, Projection, Result, Selector, Store, StoreError, Subscriber,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

patchable! {
    #[derive(Clone, Debug, PartialEq)]
    struct UserDetails {
        first_name: String,
        last_name: String,
    }
}

fn blank_user() -> UserDetails {
    UserDetails {
        first_name: String::new(),
        last_name: String::new(),
    }
}

fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Subscriber<T>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscriber = Subscriber::new(move |value: &T| sink.lock().unwrap().push(value.clone()));
    (seen, subscriber)
}

#[test]
fn read_after_write() {
    let store = Store::new(json!({ "count": 1, "name": "a" }));

    store.patch(json!({ "count": 2 }));
    assert_eq!(store.get(), json!({ "count": 2, "name": "a" }));

    store.replace(json!({ "other": true }));
    assert_eq!(store.get(), json!({ "other": true }));
}

#[test]
fn reset_restores_initial_value() {
    let store = Store::new(json!({ "first": "", "last": "" }));
    store.patch(json!({ "first": "Ken" }));
    store.patch(json!({ "extra": 1 }));
    store.replace(json!(null));

    store.reset();
    assert_eq!(store.get(), json!({ "first": "", "last": "" }));
}

#[test]
fn subscribe_then_set_is_never_lost() {
    let store = Store::with_reducer(0i32, |count: &i32, delta: i32| count + delta);
    let (seen, subscriber) = recorder();

    let _subscription = store.subscribe(&subscriber);
    store.set(5);

    assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
}

#[test]
fn unsubscribe_silences_and_is_idempotent() {
    let store = Store::new(json!({ "n": 0 }));
    let (silenced, first) = recorder();
    let (kept, second) = recorder();

    let first_subscription = store.subscribe(&first);
    let _second_subscription = store.subscribe(&second);

    first_subscription.unsubscribe();
    first_subscription.unsubscribe();

    store.patch(json!({ "n": 1 }));
    store.reset();

    assert_eq!(silenced.lock().unwrap().len(), 1);
    assert_eq!(kept.lock().unwrap().len(), 3);
    assert_eq!(store.subscriber_count(), 1);
}

#[test]
fn global_stores_are_isolated() {
    let first = create_global_store(json!({ "theme": "dark" }));
    let second = create_global_store(json!({ "theme": "dark" }));
    let (first_seen, first_subscriber) = recorder::<Value>();
    let (second_seen, second_subscriber) = recorder::<Value>();

    let _a = first.subscribe(&first_subscriber);
    let _b = second.subscribe(&second_subscriber);
    first.patch(json!({ "theme": "light" }));

    assert_eq!(first_seen.lock().unwrap().len(), 2);
    assert_eq!(second_seen.lock().unwrap().len(), 1);
    assert_eq!(second.get(), json!({ "theme": "dark" }));

    let registry = GlobalStores::global();
    assert!(registry.contains(first.id()));
    assert!(registry.contains(second.id()));
    assert_ne!(first.id(), second.id());
}

#[test]
fn global_reducer_store_outlives_handles() {
    let id = {
        let store = create_global_store_with_reducer(Vec::<u8>::new(), |items: &Vec<u8>, item: u8| {
            let mut items = items.clone();
            items.push(item);
            items
        });
        store.set(1);
        store.id()
    };

    assert!(GlobalStores::global().contains(id));
}

#[test]
fn merge_is_shallow() {
    let store = Store::new(json!({ "a": { "x": 1 }, "b": 2 }));
    store.patch(json!({ "a": { "y": 9 } }));

    assert_eq!(store.get(), json!({ "a": { "y": 9 }, "b": 2 }));
}

#[derive(Clone, Debug, PartialEq)]
struct Address {
    city: String,
    zip: String,
}

patchable! {
    #[derive(Clone, Debug, PartialEq)]
    struct Profile {
        address: Address,
        age: u32,
    }
}

#[test]
fn struct_merge_replaces_nested_records() {
    let store = Store::new(Profile {
        address: Address {
            city: "Murray Hill".to_string(),
            zip: "07974".to_string(),
        },
        age: 2,
    });

    store.patch(ProfilePatch::default().address(Address {
        city: "Berkeley".to_string(),
        zip: String::new(),
    }));

    let profile = store.get();
    assert_eq!(
        profile.address,
        Address {
            city: "Berkeley".to_string(),
            zip: String::new(),
        }
    );
    assert_eq!(profile.age, 2);
}

#[test]
fn projections_only_trigger_on_selected_change() {
    let store = Store::new(blank_user());
    let first = Selector::map(|user: &UserDetails| user.first_name.clone());
    let last = Selector::map(|user: &UserDetails| user.last_name.clone());

    let a_triggers = Arc::new(AtomicUsize::new(0));
    let b_triggers = Arc::new(AtomicUsize::new(0));
    let mut a = Projection::with_trigger({
        let a_triggers = a_triggers.clone();
        move || {
            a_triggers.fetch_add(1, Ordering::SeqCst);
        }
    });
    let mut b = Projection::with_trigger({
        let b_triggers = b_triggers.clone();
        move || {
            b_triggers.fetch_add(1, Ordering::SeqCst);
        }
    });

    assert_eq!(a.attach(&store, &first), "");
    assert_eq!(b.attach(&store, &last), "");

    store.patch(UserDetailsPatch::default().first_name("Ken"));

    assert_eq!(a.value().as_deref(), Some("Ken"));
    assert_eq!(b.value().as_deref(), Some(""));
    assert_eq!(a_triggers.load(Ordering::SeqCst), 1);
    assert_eq!(b_triggers.load(Ordering::SeqCst), 0);
}

static USER: Context<Store<UserDetails>> = Context::new("user");

#[test]
fn user_details_through_owners() {
    let app = Owner::with_label("app");
    let first_input = app.child();
    let last_input = app.child();
    let first = Selector::map(|user: &UserDetails| user.first_name.clone());
    let last = Selector::map(|user: &UserDetails| user.last_name.clone());

    let store = app
        .render(|cx| -> Result<_> {
            let store = cx.use_store(blank_user())?;
            cx.provide(&USER, store.clone());
            Ok(store)
        })
        .unwrap();

    let render_input = |owner: &Owner, selector: &Selector<UserDetails, String>| {
        owner
            .render(|cx| -> Result<String> {
                let store = cx.use_context(&USER)?;
                cx.use_projection(&store, selector)
            })
            .unwrap()
    };

    assert_eq!(render_input(&first_input, &first), "");
    assert_eq!(render_input(&last_input, &last), "");

    store.patch(UserDetailsPatch::default().first_name("Ken"));

    assert!(first_input.needs_render());
    assert!(!last_input.needs_render());
    assert_eq!(render_input(&first_input, &first), "Ken");
    assert_eq!(first_input.render_count(), 2);
    assert_eq!(last_input.render_count(), 1);
}

#[test]
fn unmounting_a_consumer_unsubscribes_it() {
    let app = Owner::new();
    let store = app.render(|cx| cx.use_store(blank_user())).unwrap();

    let field = app.child();
    field
        .render(|cx| cx.use_projection(&store, &Selector::identity()))
        .unwrap();
    assert_eq!(store.subscriber_count(), 1);

    drop(field);
    assert_eq!(store.subscriber_count(), 0);
    store.patch(UserDetailsPatch::default().last_name("Thompson"));
    assert_eq!(store.get().last_name, "Thompson");
}

#[test]
fn missing_provider_is_an_error() {
    let orphan = Owner::new();
    let err = orphan.render(|cx| cx.use_context(&USER)).unwrap_err();

    assert_eq!(err, StoreError::MissingProvider { context: "user" });
}

#[test]
fn effect_subscription_is_cleaned_up_on_unmount() {
    let store = Store::new(json!({ "visible": true }));
    let (seen, subscriber) = recorder::<Value>();
    let owner = Owner::new();

    owner
        .render(|cx| {
            let store = store.clone();
            cx.use_effect((), move || {
                let subscription = store.subscribe(&subscriber);
                move || subscription.unsubscribe()
            })
        })
        .unwrap();

    store.patch(json!({ "visible": false }));
    drop(owner);
    store.patch(json!({ "visible": true }));

    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(store.subscriber_count(), 0);
}
