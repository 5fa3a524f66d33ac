//! UI Components

use leptos::prelude::*;

use pix_client::{Notification, QrPayload};

/// Dismissable notification banner
#[component]
pub fn NotificationBanner(notification: RwSignal<Option<Notification>>) -> impl IntoView {
    move || {
        notification.get().map(|n| {
            let class = format!("notification notification-{}", n.kind.as_str());
            view! {
                <div class=class role="status">
                    <span>{n.message}</span>
                    <button class="close" on:click=move |_| notification.set(None)>"×"</button>
                </div>
            }
        })
    }
}

/// QR image plus the copy-and-paste code
#[component]
pub fn QrCode(qr: QrPayload, #[prop(into)] on_copy: Callback<String>) -> impl IntoView {
    let image = qr.image_src().map(|src| {
        view! { <img class="qr" src=src alt="PIX QR code" width="240" height="240" /> }
    });

    let code = qr.code.map(|code| {
        let copy = code.clone();
        view! {
            <div class="pix-code">
                <textarea readonly=true rows="4">{code}</textarea>
                <button class="btn" on:click=move |_| on_copy.run(copy.clone())>
                    "Copy PIX code"
                </button>
            </div>
        }
    });

    view! {
        <div class="qr-container">
            {image}
            {code}
        </div>
    }
}

/// Success panel shown once the payment is approved
#[component]
pub fn PaymentConfirmed(email: String, #[prop(into)] on_new: Callback<()>) -> impl IntoView {
    view! {
        <div class="confirmed">
            <h2>"Payment confirmed!"</h2>
            <p>"We are sending your access link to " <strong>{email}</strong> "."</p>
            <p class="hint">"Check your spam folder if it does not arrive in a few minutes."</p>
            <button class="btn" on:click=move |_| on_new.run(())>"New payment"</button>
        </div>
    }
}
