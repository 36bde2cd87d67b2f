//! HTTP tests for interface_api
//!
//! Drive the full router over in-memory storage with `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use core_kernel::{CustomerId, DealerId, TransactionId, UserId};
use domain_billing::{Role, StandardMethods};
use interface_api::auth::create_token;
use interface_api::config::ApiConfig;
use interface_api::{create_router, AppState};
use test_utils::{GatewayFixtures, TemporalFixtures, TestCallbackBuilder, TestServiceBuilder};

const JWT_SECRET: &str = "api-test-secret-0123456789";

struct TestApp {
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let config = ApiConfig {
            jwt_secret: JWT_SECRET.to_string(),
            ..ApiConfig::default()
        };
        let service = TestServiceBuilder::new().with_vnpay().build();
        Self {
            router: create_router(AppState::new(service, config)),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        role: Option<Role>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send_as(method, uri, role.map(|r| (UserId::new(), r)), body).await
    }

    async fn send_as(
        &self,
        method: Method,
        uri: &str,
        user: Option<(UserId, Role)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some((user_id, role)) = user {
            let token = create_token(user_id, &[role], JWT_SECRET, 3600).unwrap();
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn sync_order(&self, customer: CustomerId, total: &str) -> Uuid {
        let id = Uuid::new_v4();
        let (status, _) = self
            .send(
                Method::POST,
                "/api/v1/documents",
                Some(Role::DealerStaff),
                Some(json!({
                    "id": id,
                    "kind": "CUSTOMER_ORDER",
                    "owner_id": customer.as_uuid(),
                    "total_amount": total,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    async fn sync_invoice(&self, dealer: DealerId, total: &str, due_date: chrono::NaiveDate) -> Uuid {
        let id = Uuid::new_v4();
        let (status, _) = self
            .send(
                Method::POST,
                "/api/v1/documents",
                Some(Role::ManufacturerStaff),
                Some(json!({
                    "id": id,
                    "kind": "DEALER_INVOICE",
                    "owner_id": dealer.as_uuid(),
                    "total_amount": total,
                    "due_date": due_date,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        id
    }
}

fn cash_payment(amount: &str) -> Value {
    json!({ "amount": amount, "method_id": Uuid::from(StandardMethods::CASH) })
}

fn ipn_uri(params: &std::collections::BTreeMap<String, String>) -> String {
    let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("/gateway/vnpay/ipn?{}", query.join("&"))
}

// ============================================================================
// Manual Payment Tests
// ============================================================================

mod manual_payment_tests {
    use super::*;

    #[tokio::test]
    async fn test_cash_payment_confirmed_by_manager() {
        let app = TestApp::new();
        let customer = CustomerId::new();
        let order = app.sync_order(customer, "30000000").await;

        let (status, recorded) = app
            .send(
                Method::POST,
                &format!("/api/v1/documents/orders/{}/payments", order),
                Some(Role::DealerStaff),
                Some(cash_payment("30000000")),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(recorded["transaction"]["state"], "PENDING_CONFIRMATION");
        assert_eq!(recorded["document_status"]["status"], "UNPAID");
        assert_eq!(recorded["document_status"]["pending_amount"], "30000000");

        let tx_id = recorded["transaction"]["id"].as_str().unwrap().to_string();
        let (status, confirmed) = app
            .send(
                Method::POST,
                &format!("/api/v1/transactions/{}/confirm", tx_id),
                Some(Role::DealerManager),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["transaction"]["state"], "SUCCESS");
        assert_eq!(confirmed["document_status"]["status"], "PAID");
        assert_eq!(confirmed["document_status"]["remaining_amount"], "0");

        let (status, debt) = app
            .send(
                Method::GET,
                &format!("/api/v1/debt/customers/{}", customer.as_uuid()),
                Some(Role::DealerStaff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(debt["owner_kind"], "CUSTOMER");
        assert_eq!(debt["total_paid"], "30000000");
        assert_eq!(debt["current_balance"], "0");
    }

    #[tokio::test]
    async fn test_peer_cannot_confirm() {
        let app = TestApp::new();
        let order = app.sync_order(CustomerId::new(), "10000000").await;

        let (_, recorded) = app
            .send(
                Method::POST,
                &format!("/api/v1/documents/orders/{}/payments", order),
                Some(Role::DealerStaff),
                Some(cash_payment("10000000")),
            )
            .await;
        let tx_id = recorded["transaction"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/api/v1/transactions/{}/confirm", tx_id),
                Some(Role::DealerStaff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }

    #[tokio::test]
    async fn test_reject_with_reason_then_confirm_conflicts() {
        let app = TestApp::new();
        let order = app.sync_order(CustomerId::new(), "10000000").await;
        let (_, recorded) = app
            .send(
                Method::POST,
                &format!("/api/v1/documents/orders/{}/payments", order),
                Some(Role::DealerStaff),
                Some(cash_payment("4000000")),
            )
            .await;
        let tx_id = recorded["transaction"]["id"].as_str().unwrap().to_string();

        let (status, rejected) = app
            .send(
                Method::POST,
                &format!("/api/v1/transactions/{}/reject", tx_id),
                Some(Role::DealerManager),
                Some(json!({ "reason": "counterfeit notes" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["transaction"]["state"], "FAILED");
        assert_eq!(rejected["transaction"]["failure_reason"], "counterfeit notes");
        assert_eq!(rejected["document_status"]["remaining_amount"], "10000000");

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/api/v1/transactions/{}/confirm", tx_id),
                Some(Role::DealerManager),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_transaction_state");
    }

    #[tokio::test]
    async fn test_overpayment_is_a_conflict() {
        let app = TestApp::new();
        let order = app.sync_order(CustomerId::new(), "1000000").await;

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/api/v1/documents/orders/{}/payments", order),
                Some(Role::DealerStaff),
                Some(cash_payment("1200000")),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "overpayment_rejected");
    }

    #[tokio::test]
    async fn test_fractional_dong_is_rejected() {
        let app = TestApp::new();
        let order = app.sync_order(CustomerId::new(), "1000000").await;

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/api/v1/documents/orders/{}/payments", order),
                Some(Role::DealerStaff),
                Some(cash_payment("100.5")),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
    }
}

// ============================================================================
// Routing and Auth Tests
// ============================================================================

mod routing_tests {
    use super::*;

    #[tokio::test]
    async fn test_kind_in_path_must_match_document() {
        let app = TestApp::new();
        let order = app.sync_order(CustomerId::new(), "1000000").await;

        let (status, _) = app
            .send(
                Method::GET,
                &format!("/api/v1/documents/invoices/{}/status", order),
                Some(Role::DealerStaff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send(
                Method::GET,
                &format!("/api/v1/documents/quotes/{}/status", order),
                Some(Role::DealerStaff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/v1/documents/orders/{}/status", order),
                Some(Role::Customer),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UNPAID");
        assert_eq!(body["currency"], "VND");
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                Method::GET,
                &format!("/api/v1/documents/orders/{}/transactions", Uuid::new_v4()),
                Some(Role::DealerStaff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_bad_token_is_unauthorized() {
        let app = TestApp::new();
        let request = Request::builder()
            .uri("/api/v1/payment-methods")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_long_lived_token_is_unauthorized() {
        let app = TestApp::new();
        let token = create_token(UserId::new(), &[Role::Admin], JWT_SECRET, 30 * 24 * 3600).unwrap();
        let request = Request::builder()
            .uri("/api/v1/payment-methods")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invoice_sync_requires_due_date() {
        let app = TestApp::new();
        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/documents",
                Some(Role::ManufacturerStaff),
                Some(json!({
                    "kind": "DEALER_INVOICE",
                    "owner_id": Uuid::new_v4(),
                    "total_amount": "1200000000",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_resync_with_new_total_is_refused() {
        let app = TestApp::new();
        let customer = CustomerId::new();
        let order = app.sync_order(customer, "500000").await;
        let resync = |total: &str| {
            json!({
                "id": order,
                "kind": "CUSTOMER_ORDER",
                "owner_id": customer.as_uuid(),
                "total_amount": total,
            })
        };

        let (status, _) = app
            .send(Method::POST, "/api/v1/documents", Some(Role::DealerStaff), Some(resync("500000")))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(Method::POST, "/api/v1/documents", Some(Role::DealerStaff), Some(resync("2000000")))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, body) = app
            .send(
                Method::GET,
                &format!("/api/v1/documents/orders/{}/status", order),
                Some(Role::DealerStaff),
                None,
            )
            .await;
        assert_eq!(body["total_amount"], "500000");
    }

    #[tokio::test]
    async fn test_customers_cannot_sync_documents() {
        let app = TestApp::new();
        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/documents",
                Some(Role::Customer),
                Some(json!({
                    "kind": "CUSTOMER_ORDER",
                    "owner_id": Uuid::new_v4(),
                    "total_amount": 1000000,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

// ============================================================================
// Gateway Tests
// ============================================================================

mod gateway_tests {
    use super::*;

    #[tokio::test]
    async fn test_checkout_then_ipn_settles_invoice() {
        let app = TestApp::new();
        let dealer = DealerId::new();
        let invoice = app
            .sync_invoice(dealer, "1200000000", TemporalFixtures::as_of())
            .await;

        let (status, checkout) = app
            .send(
                Method::POST,
                &format!("/api/v1/documents/invoices/{}/gateway-checkout", invoice),
                Some(Role::DealerStaff),
                Some(json!({ "amount": "500000000" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(checkout["redirect_url"]
            .as_str()
            .unwrap()
            .starts_with(GatewayFixtures::payment_url()));
        assert_eq!(checkout["transaction"]["state"], "PENDING_GATEWAY");
        assert_eq!(checkout["document_status"]["pending_amount"], "500000000");

        let tx_id: Uuid = checkout["transaction"]["id"].as_str().unwrap().parse().unwrap();
        let callback = TestCallbackBuilder::new(TransactionId::from(tx_id), 500_000_000).build();

        let (status, ack) = app.send(Method::GET, &ipn_uri(&callback), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["RspCode"], "00");

        let (_, replay) = app.send(Method::GET, &ipn_uri(&callback), None, None).await;
        assert_eq!(replay["RspCode"], "02");

        let (_, document) = app
            .send(
                Method::GET,
                &format!("/api/v1/documents/invoices/{}/status", invoice),
                Some(Role::DealerStaff),
                None,
            )
            .await;
        assert_eq!(document["status"], "PARTIALLY_PAID");
        assert_eq!(document["paid_amount"], "500000000");
        assert_eq!(document["remaining_amount"], "700000000");
    }

    #[tokio::test]
    async fn test_tampered_ipn_is_acknowledged_without_credit() {
        let app = TestApp::new();
        let order = app.sync_order(CustomerId::new(), "20000000").await;

        let (_, checkout) = app
            .send(
                Method::POST,
                &format!("/api/v1/documents/orders/{}/gateway-checkout", order),
                Some(Role::Customer),
                Some(json!({ "amount": 20000000 })),
            )
            .await;
        let tx_id: Uuid = checkout["transaction"]["id"].as_str().unwrap().parse().unwrap();

        let callback = TestCallbackBuilder::new(TransactionId::from(tx_id), 20_000_000)
            .tampered()
            .build();
        let (status, ack) = app.send(Method::GET, &ipn_uri(&callback), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["RspCode"], "97");

        let (_, transaction) = app
            .send(
                Method::GET,
                &format!("/api/v1/transactions/{}", tx_id),
                Some(Role::DealerStaff),
                None,
            )
            .await;
        assert_eq!(transaction["state"], "PENDING_GATEWAY");
    }

    #[tokio::test]
    async fn test_expiry_sweep_needs_manufacturer_staff() {
        let app = TestApp::new();

        let (status, _) = app
            .send(Method::POST, "/api/v1/admin/gateway/expire", Some(Role::DealerManager), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(Method::POST, "/api/v1/admin/gateway/expire", Some(Role::ManufacturerStaff), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }
}

// ============================================================================
// Debt and Method Tests
// ============================================================================

mod debt_tests {
    use super::*;

    #[tokio::test]
    async fn test_dealer_listing_and_aging() {
        let app = TestApp::new();
        let dealer = DealerId::new();
        app.sync_invoice(dealer, "3100000", TemporalFixtures::days_before_as_of(45))
            .await;
        app.sync_invoice(dealer, "900000", TemporalFixtures::days_before_as_of(-10))
            .await;

        let (status, page) = app
            .send(
                Method::GET,
                "/api/v1/debt/dealers?page=1&per_page=10",
                Some(Role::ManufacturerStaff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["document_count"], 2);
        assert_eq!(page["items"][0]["current_balance"], "4000000");

        let (status, aging) = app
            .send(
                Method::GET,
                &format!(
                    "/api/v1/debt/dealers/{}/aging?as_of={}",
                    dealer.as_uuid(),
                    TemporalFixtures::as_of()
                ),
                Some(Role::ManufacturerStaff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(aging["current"], "900000");
        assert_eq!(aging["days_31_60"], "3100000");
        assert_eq!(aging["days_over_60"], "0");
        assert_eq!(aging["total"], "4000000");
    }

    #[tokio::test]
    async fn test_aging_is_only_for_dealers() {
        let app = TestApp::new();
        let (status, _) = app
            .send(
                Method::GET,
                &format!("/api/v1/debt/customers/{}/aging", Uuid::new_v4()),
                Some(Role::ManufacturerStaff),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod method_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_by_channel() {
        let app = TestApp::new();

        let (_, b2c) = app
            .send(Method::GET, "/api/v1/payment-methods?channel=B2C", Some(Role::Customer), None)
            .await;
        let (_, all) = app
            .send(Method::GET, "/api/v1/payment-methods", Some(Role::Customer), None)
            .await;

        assert_eq!(b2c.as_array().unwrap().len(), 2);
        assert_eq!(all.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_create_and_deactivate_method() {
        let app = TestApp::new();
        let body = json!({ "name": "Cheque", "settlement_kind": "MANUAL", "scope": "B2B" });

        let (status, _) = app
            .send(Method::POST, "/api/v1/payment-methods", Some(Role::DealerManager), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = app
            .send(Method::POST, "/api/v1/payment-methods", Some(Role::ManufacturerStaff), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["active"], true);

        let id = created["id"].as_str().unwrap().to_string();
        let (status, updated) = app
            .send(
                Method::PATCH,
                &format!("/api/v1/payment-methods/{}", id),
                Some(Role::ManufacturerStaff),
                Some(json!({ "active": false })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["active"], false);

        let (_, b2b) = app
            .send(Method::GET, "/api/v1/payment-methods?channel=B2B", Some(Role::DealerStaff), None)
            .await;
        assert!(b2b.as_array().unwrap().iter().all(|m| m["name"] != "Cheque"));
    }
}
