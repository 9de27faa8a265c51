//! Two text inputs sharing one scoped store, each echoed by its own display.
//!
//! The first display can be toggled off and on; while hidden it is
//! unmounted and no longer subscribed.
//!
//! Run with `RUST_LOG=partyline=trace cargo run --example user_details` to
//! watch subscriptions come and go.

use partyline::{patchable, Context, Owner, Result, Selector, Store};
use tracing::info;
use tracing_subscriber::EnvFilter;

patchable! {
    #[derive(Clone, Debug, PartialEq)]
    struct UserDetails {
        first_name: String,
        last_name: String,
    }
}

static APP: Context<Store<UserDetails>> = Context::new("app");

/// A display component: reads the store from context and shows one field.
fn render_display(owner: &Owner, field: &Selector<UserDetails, String>) -> Result<String> {
    owner.render(|cx| -> Result<String> {
        let store = cx.use_context(&APP)?;
        let value = cx.use_projection(&store, field)?;
        info!(owner = %cx.owner_id(), %value, "display rendered");
        Ok(value)
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let first_name = Selector::map(|user: &UserDetails| user.first_name.clone());
    let last_name = Selector::map(|user: &UserDetails| user.last_name.clone());

    let app = Owner::with_label("app");
    let store = app.render(|cx| -> Result<_> {
        let store = cx.use_store(UserDetails {
            first_name: String::new(),
            last_name: String::new(),
        })?;
        cx.provide(&APP, store.clone());
        Ok(store)
    })?;

    let mut first_display = Some(app.child());
    let last_display = app.child();
    if let Some(display) = &first_display {
        render_display(display, &first_name)?;
    }
    render_display(&last_display, &last_name)?;

    // Typing into the inputs.
    for (first, last) in [("K", ""), ("Ken", ""), ("Ken", "Thompson")] {
        store.patch(UserDetailsPatch::default().first_name(first).last_name(last));

        for (display, field) in [(first_display.as_ref(), &first_name), (Some(&last_display), &last_name)] {
            if let Some(display) = display.filter(|display| display.needs_render()) {
                render_display(display, field)?;
            }
        }
    }

    // Toggle the first display off, then edit while it is unmounted.
    first_display = None;
    info!(subscribers = store.subscriber_count(), "first display hidden");
    store.patch(UserDetailsPatch::default().first_name("Dennis"));

    // Toggle it back on: a fresh mount seeds from the current value.
    let display = first_display.insert(app.child());
    let shown = render_display(display, &first_name)?;
    info!(%shown, subscribers = store.subscriber_count(), "first display shown");

    info!(user = ?store.get(), "final state");
    Ok(())
}
