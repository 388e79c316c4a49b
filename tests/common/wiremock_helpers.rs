use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use icardfinder::transport::TransportSettings;

pub const LOOKUP_PATH: &str = "/HPDonline/provide_address.aspx";
pub const SELECT_PATH: &str = "/HPDonline/select_application.aspx";

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Transport settings pointing both endpoints at `server`
pub fn settings_for(server: &MockServer) -> TransportSettings {
    TransportSettings {
        lookup_url: format!("{}{}?subject=&env_report=REMOTE_HOST", server.uri(), LOOKUP_PATH),
        select_url: format!("{}{}", server.uri(), SELECT_PATH),
        street_separator: "+".to_string(),
        user_agent: "icardfinder-tests/1.0".to_string(),
        request_timeout: Duration::from_secs(5),
    }
}

/// Serves `form_page` for the lookup of one address and `results_page` for the
/// I-card selection postback.
pub async fn mock_hpd_server(
    borough_id: &str,
    house: &str,
    street_param: &str,
    form_page: &str,
    results_page: &str,
) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .and(query_param("p1", borough_id))
        .and(query_param("p2", house))
        .and(query_param("p3", street_param))
        .respond_with(html(form_page).insert_header("set-cookie", "ASP.NET_SessionId=abc123; path=/"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(SELECT_PATH))
        .and(body_string_contains("__EVENTTARGET=lbtnIcard"))
        .respond_with(html(results_page))
        .expect(1)
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that returns the specified HTTP error status code.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("delayed response")
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}
