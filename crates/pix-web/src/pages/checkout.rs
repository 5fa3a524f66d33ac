//! Checkout Page
//!
//! Form → QR code with status polling → confirmation. Polling and the email
//! dispatch are owned by [`Checkout`] so a new payment, a confirmation or
//! leaving the page always cancels them.

use chrono::TimeZone;
use futures::future::{AbortHandle, abortable};
use leptos::prelude::*;
use leptos::task::spawn_local;

use pix_client::{
    CheckoutApi, FormErrors, HttpCheckoutApi, NOTIFICATION_TIMEOUT, Notification, PaymentSession,
    PollEvent, PollerCore, QrPayload, Restored, dispatch_confirmation_email, now_ms,
    validate_checkout_form,
};
use pix_core::{
    Deployment, EmailAddress,
    wire::{CreatePaymentRequest, SendEmailRequest},
};

use crate::browser::{self, log, log_error, session_store};
use crate::components::{NotificationBanner, PaymentConfirmed, QrCode};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Stage {
    Form,
    Awaiting {
        payment_id: String,
        created_at: i64,
        qr: QrPayload,
    },
    Confirmed {
        email: String,
    },
}

/// Page controller; every field is a reactive handle so it is `Copy`
#[derive(Clone, Copy)]
struct Checkout {
    stage: RwSignal<Stage>,
    notification: RwSignal<Option<Notification>>,
    notice_timer: StoredValue<Option<TimeoutHandle>>,
    core: StoredValue<PollerCore>,
    timer: StoredValue<Option<IntervalHandle>>,
    dispatch: StoredValue<Option<AbortHandle>>,
    deployment: Deployment,
}

fn api() -> HttpCheckoutApi {
    HttpCheckoutApi::new(browser::origin())
}

impl Checkout {
    fn new() -> Self {
        Self {
            stage: RwSignal::new(Stage::Form),
            notification: RwSignal::new(None),
            notice_timer: StoredValue::new(None),
            core: StoredValue::new(PollerCore::new()),
            timer: StoredValue::new(None),
            dispatch: StoredValue::new(None),
            deployment: browser::deployment(),
        }
    }

    fn notify(self, notification: Notification) {
        if let Some(handle) = self.notice_timer.get_value() {
            handle.clear();
        }
        self.notification.set(Some(notification));

        let banner = self.notification;
        let handle = set_timeout_with_handle(move || banner.set(None), NOTIFICATION_TIMEOUT).ok();
        self.notice_timer.set_value(handle);
    }

    // ------------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------------

    fn stop_polling(self) {
        if let Some(handle) = self.timer.get_value() {
            handle.clear();
        }
        self.timer.set_value(None);
    }

    fn start_polling(self, payment_id: String) {
        self.stop_polling();

        let generation = self
            .core
            .try_update_value(|core| core.start(payment_id.clone()))
            .unwrap_or_default();
        let interval = self.deployment.poll_interval();
        log(&format!("Polling payment {payment_id} every {}s", interval.as_secs()));

        match set_interval_with_handle(move || self.poll_once(generation, payment_id.clone()), interval)
        {
            Ok(handle) => self.timer.set_value(Some(handle)),
            Err(e) => log_error(&format!("Could not start polling: {e:?}")),
        }
    }

    fn poll_once(self, generation: u64, payment_id: String) {
        spawn_local(async move {
            match api().payment_status(&payment_id).await {
                Ok(response) => {
                    let event = self
                        .core
                        .try_update_value(|core| core.observe(generation, &response.status));
                    match event {
                        Some(PollEvent::Confirmed { payment_id }) => {
                            log(&format!("Payment {payment_id} approved"));
                            self.confirm(payment_id);
                        }
                        Some(PollEvent::Continue) => {
                            log(&format!("Payment {payment_id} is {}", response.status));
                        }
                        Some(PollEvent::Ignored) | None => {}
                    }
                }
                Err(e) => {
                    log_error(&format!("Status check for {payment_id} failed: {e}"));
                    self.notify(Notification::error(e.user_message()));
                }
            }
        });
    }

    /// Restart polling when the tab becomes visible and nothing is polling
    fn on_visibility_change(self) {
        if !browser::page_visible() || self.timer.with_value(Option::is_some) {
            return;
        }
        if matches!(self.stage.get_untracked(), Stage::Confirmed { .. }) {
            return;
        }
        self.resume();
    }

    /// Pick up a persisted, unconfirmed, fresh session
    fn resume(self) {
        let Some(store) = session_store() else {
            return;
        };

        match store.restore(now_ms()) {
            Restored::Resume(session) => {
                log(&format!("Resuming payment {}", session.payment_id));
                self.stage.set(Stage::Awaiting {
                    payment_id: session.payment_id.clone(),
                    created_at: session.created_at,
                    qr: session.qr.unwrap_or_default(),
                });
                self.start_polling(session.payment_id);
            }
            Restored::Expired => {
                self.stage.set(Stage::Form);
                self.notify(Notification::info(
                    "Your previous payment expired. Please start a new one.",
                ));
            }
            Restored::Confirmed | Restored::Empty => {}
        }
    }

    // ------------------------------------------------------------------------
    // Payment lifecycle
    // ------------------------------------------------------------------------

    fn create(self, email: EmailAddress, loading: RwSignal<bool>) {
        loading.set(true);

        spawn_local(async move {
            let request = CreatePaymentRequest {
                email: email.to_string(),
                amount: None,
            };

            match api().create_payment(&request).await {
                Ok(response) => {
                    let qr = QrPayload {
                        code: response.pix_code,
                        image_base64: response.pix_code_base64,
                    };
                    let session =
                        PaymentSession::new(response.payment_id.clone(), email.as_str(), now_ms())
                            .with_qr(qr.clone());

                    if let Some(store) = session_store() {
                        if let Err(e) = store.save(&session) {
                            log_error(&format!("Could not persist payment: {e}"));
                        }
                    }

                    self.stage.set(Stage::Awaiting {
                        payment_id: session.payment_id.clone(),
                        created_at: session.created_at,
                        qr,
                    });
                    self.notify(Notification::info("Payment created. Scan the QR code to pay."));
                    self.start_polling(session.payment_id);
                }
                Err(e) => {
                    log_error(&format!("Payment creation failed: {e}"));
                    self.notify(Notification::error(e.user_message()));
                }
            }

            loading.set(false);
        });
    }

    fn confirm(self, payment_id: String) {
        self.stop_polling();

        let email = session_store()
            .map(|store| {
                let email = store.load().map(|s| s.email).unwrap_or_default();
                if let Err(e) = store.mark_confirmed() {
                    log_error(&format!("Could not persist confirmation: {e}"));
                }
                store.clear();
                email
            })
            .unwrap_or_default();

        self.stage.set(Stage::Confirmed {
            email: email.clone(),
        });
        self.notify(Notification::success("Payment confirmed!"));

        if email.is_empty() {
            log_error(&format!("No email stored for payment {payment_id}"));
            return;
        }

        self.send_email(SendEmailRequest {
            email,
            payment_id: Some(payment_id),
        });
    }

    fn send_email(self, request: SendEmailRequest) {
        self.cancel_email();

        let deployment = self.deployment;
        let (task, handle) = abortable(async move {
            dispatch_confirmation_email(
                &api(),
                &request,
                &deployment.email_retry_policy(),
                deployment.email_dispatch_delay(),
                browser::sleep,
            )
            .await
        });
        self.dispatch.set_value(Some(handle));

        spawn_local(async move {
            let Ok(report) = task.await else {
                log("Confirmation email dispatch cancelled");
                return;
            };
            if report.outcome.is_success() {
                log(&report.summary());
            } else {
                log_error(&report.summary());
            }
            match report.notification {
                Some(notification) => self.notify(notification),
                None => self.notify(Notification::success("Confirmation email sent!")),
            }
        });
    }

    fn cancel_email(self) {
        if let Some(handle) = self.dispatch.get_value() {
            handle.abort();
        }
        self.dispatch.set_value(None);
    }

    /// "New payment": forget everything about the current one
    fn reset(self) {
        self.stop_polling();
        self.cancel_email();
        self.core.update_value(PollerCore::reset);
        if let Some(store) = session_store() {
            store.clear();
        }
        self.notification.set(None);
        self.stage.set(Stage::Form);
    }

    fn copy(self, code: String) {
        spawn_local(async move {
            match browser::copy_to_clipboard(&code).await {
                Ok(()) => self.notify(Notification::success("PIX code copied!")),
                Err(e) => {
                    log_error(&format!("Clipboard write failed: {e}"));
                    self.notify(Notification::error(
                        "Could not copy. Select the code and copy it manually.",
                    ));
                }
            }
        });
    }
}

fn format_time(ms: i64) -> String {
    chrono::Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

#[component]
pub fn CheckoutPage() -> impl IntoView {
    let checkout = Checkout::new();
    let email = RwSignal::new(String::new());
    let confirmation = RwSignal::new(String::new());
    let errors = RwSignal::new(FormErrors::default());
    let loading = RwSignal::new(false);

    checkout.resume();

    let visibility =
        window_event_listener_untyped("visibilitychange", move |_| checkout.on_visibility_change());
    on_cleanup(move || {
        visibility.remove();
        checkout.stop_polling();
        checkout.cancel_email();
    });

    let submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if loading.get_untracked() {
            return;
        }
        match validate_checkout_form(&email.get_untracked(), &confirmation.get_untracked()) {
            Ok(address) => {
                errors.set(FormErrors::default());
                checkout.create(address, loading);
            }
            Err(field_errors) => errors.set(field_errors),
        }
    };

    let body = move || match checkout.stage.get() {
        Stage::Form => view! {
            <form class="checkout-form" on:submit=submit novalidate=true>
                <div class="field">
                    <label for="email">"Email"</label>
                    <input
                        id="email"
                        type="email"
                        placeholder="you@example.com"
                        prop:value=move || email.get()
                        on:input=move |ev| email.set(event_target_value(&ev))
                    />
                    {move || errors.get().email.map(|m| view! { <span class="field-error">{m}</span> })}
                </div>
                <div class="field">
                    <label for="confirm-email">"Confirm email"</label>
                    <input
                        id="confirm-email"
                        type="email"
                        placeholder="you@example.com"
                        prop:value=move || confirmation.get()
                        on:input=move |ev| confirmation.set(event_target_value(&ev))
                    />
                    {move || {
                        errors.get().confirmation.map(|m| view! { <span class="field-error">{m}</span> })
                    }}
                </div>
                <button class="btn btn-primary" type="submit" disabled=move || loading.get()>
                    {move || if loading.get() { "Generating..." } else { "Pay with PIX" }}
                </button>
            </form>
        }
        .into_any(),

        Stage::Awaiting { payment_id, created_at, qr } => view! {
            <div class="awaiting">
                <h2>"Scan to pay"</h2>
                <QrCode qr=qr on_copy=Callback::new(move |code: String| checkout.copy(code)) />
                <p class="status">
                    <span class="spinner"></span>
                    "Waiting for payment confirmation..."
                </p>
                <p class="meta">
                    "Payment " {payment_id} " created at " {format_time(created_at)}
                </p>
                <button class="btn btn-link" on:click=move |_| checkout.reset()>
                    "New payment"
                </button>
            </div>
        }
        .into_any(),

        Stage::Confirmed { email } => view! {
            <PaymentConfirmed email=email on_new=move || checkout.reset() />
        }
        .into_any(),
    };

    view! {
        <div class="checkout">
            <header>
                <h1>"PIX Checkout"</h1>
            </header>
            <NotificationBanner notification=checkout.notification />
            {body}
        </div>
    }
}
