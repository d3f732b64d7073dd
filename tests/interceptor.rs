//! End-to-end interception protocol on a paused tokio clock.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use netcondition::{
    ConditionLayer,
    ConditionProfile,
    InterceptedRequest,
    InterceptorBuilder,
    InterceptorRegistry,
    RequestInterceptor,
    ResponseOrigin,
    entropy::Entropy,
    hooks::{FnHandler, HandlerDecision},
    middleware::{Service, Transform},
    presets::preset,
};
use netcondition_testing::{StaticUpstream, UnreachableUpstream};
use rstest::rstest;
use tokio::time::Instant;
use tracing_test::traced_test;

fn profile(base_ms: u64, jitter: (i64, i64), rate: f64) -> ConditionProfile {
    ConditionProfile::builder("under-test")
        .base_delay_ms(base_ms)
        .jitter_ms(jitter.0, jitter.1)
        .failure_rate(rate)
        .build()
        .expect("valid profile")
}

async fn timed<S: Service + 'static>(
    interceptor: &RequestInterceptor<S>,
    url: &str,
) -> (ResponseOrigin, Duration) {
    let started = Instant::now();
    let response = interceptor
        .handle(InterceptedRequest::get(url))
        .await
        .expect("not aborted");
    (response.origin(), started.elapsed())
}

#[rstest]
#[case(1_500, (0, 800))]
#[case(300, (-100, 500))]
#[case(100, (0, 150))]
#[case(0, (0, 0))]
#[tokio::test(start_paused = true)]
async fn observed_delay_stays_within_profile_bounds(#[case] base_ms: u64, #[case] jitter: (i64, i64)) {
    let interceptor = RequestInterceptor::builder()
        .seed(11)
        .build(StaticUpstream::ok());
    let profile = profile(base_ms, jitter, 0.0);
    let (low, high) = profile.delay_bounds();
    interceptor.registry().register("**/api/**", profile).expect("register");

    for _ in 0..50 {
        let (origin, elapsed) = timed(&interceptor, "/api/balance").await;
        assert_eq!(origin, ResponseOrigin::Upstream);
        assert!(elapsed >= low && elapsed <= high, "{elapsed:?} outside {low:?}..={high:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn empirical_failure_rate_converges() {
    let upstream = StaticUpstream::ok();
    let interceptor = RequestInterceptor::builder()
        .seed(2024)
        .build(upstream.clone());
    interceptor
        .registry()
        .register("**", profile(0, (0, 0), 0.25))
        .expect("register");

    let trials = 4_000;
    let mut failures = 0;
    for _ in 0..trials {
        let (origin, _) = timed(&interceptor, "/anything").await;
        if origin == ResponseOrigin::Injected {
            failures += 1;
        }
    }
    // Four standard deviations of Binomial(4000, 0.25) is about 110.
    assert!((890..=1_110).contains(&failures), "{failures} failures");
    assert_eq!(upstream.calls(), trials - failures);
}

#[tokio::test(start_paused = true)]
async fn three_g_preset_on_api_routes() {
    let upstream = StaticUpstream::ok();
    let interceptor = RequestInterceptor::builder().seed(3).build(upstream.clone());
    interceptor
        .registry()
        .register("**/api/**", preset("3g").expect("preset"))
        .expect("register");

    let mut injected = 0;
    for i in 0..100 {
        let (origin, elapsed) = timed(&interceptor, &format!("/api/accounts/{i}")).await;
        match origin {
            ResponseOrigin::Injected => injected += 1,
            ResponseOrigin::Upstream => {
                assert!(elapsed >= Duration::from_millis(1_500), "{elapsed:?}");
                assert!(elapsed <= Duration::from_millis(2_300), "{elapsed:?}");
            }
            other => panic!("unexpected origin {other:?}"),
        }
    }
    assert!((5..=19).contains(&injected), "{injected} injected failures");
    assert_eq!(upstream.calls(), 100 - injected);
}

#[rstest]
#[case("https://bank.test/api/app/init")]
#[case("http://localhost:8080/api/app/init?cold=1")]
#[case("/api/app/init")]
#[tokio::test(start_paused = true)]
async fn literal_route_claims_absolute_urls_by_path(#[case] url: &str) {
    let upstream = StaticUpstream::ok();
    let interceptor = RequestInterceptor::builder().seed(5).build(upstream.clone());
    interceptor
        .registry()
        .register("/api/app/init", preset("app-startup").expect("preset"))
        .expect("register");

    let (origin, elapsed) = timed(&interceptor, url).await;
    assert_eq!(origin, ResponseOrigin::Upstream);
    assert!(elapsed >= Duration::from_millis(2_500), "{elapsed:?} for {url}");
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn host_qualified_patterns_still_match() {
    let interceptor = RequestInterceptor::builder().build(StaticUpstream::ok());
    interceptor
        .registry()
        .register("https://cdn.test/**", profile(400, (0, 0), 0.0))
        .expect("register");

    let (_, claimed) = timed(&interceptor, "https://cdn.test/img/logo.png").await;
    let (_, unclaimed) = timed(&interceptor, "https://bank.test/img/logo.png").await;
    assert_eq!(claimed, Duration::from_millis(400));
    assert!(unclaimed.is_zero());
}

#[tokio::test(start_paused = true)]
async fn one_request_delay_does_not_block_another() {
    let interceptor = RequestInterceptor::builder().build(StaticUpstream::ok());
    let registry = interceptor.registry();
    registry.register("**/slow/**", profile(5_000, (0, 0), 0.0)).expect("register");
    registry.register("**/fast/**", profile(100, (0, 0), 0.0)).expect("register");

    let started = Instant::now();
    let slow = interceptor.spawn(InterceptedRequest::get("/slow/report"));
    let (_, fast_elapsed) = timed(&interceptor, "/fast/ping").await;
    assert_eq!(fast_elapsed, Duration::from_millis(100));

    slow.await.expect("joined").expect("not aborted");
    assert_eq!(started.elapsed(), Duration::from_millis(5_000));
}

#[tokio::test(start_paused = true)]
async fn many_concurrent_requests_overlap_their_delays() {
    let interceptor = RequestInterceptor::builder().build(StaticUpstream::ok());
    interceptor
        .registry()
        .register("**", profile(1_000, (0, 0), 0.0))
        .expect("register");

    let started = Instant::now();
    let requests = (0..200).map(|i| interceptor.handle(InterceptedRequest::get(format!("/r/{i}"))));
    let results = join_all(requests).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(started.elapsed(), Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn forward_errors_stay_distinct_from_injected_failures() {
    let upstream = UnreachableUpstream::new();
    let interceptor = RequestInterceptor::builder().build(upstream.clone());
    let registry = interceptor.registry();
    registry.register("**/down/**", profile(0, (0, 0), 0.0)).expect("register");
    registry.register("**/fail/**", profile(0, (0, 0), 1.0)).expect("register");

    let down = interceptor
        .handle(InterceptedRequest::get("/down/x"))
        .await
        .expect("not aborted");
    let failed = interceptor
        .handle(InterceptedRequest::get("/fail/x"))
        .await
        .expect("not aborted");
    let unclaimed = interceptor
        .handle(InterceptedRequest::get("/other"))
        .await
        .expect("not aborted");

    assert_eq!(down.origin(), ResponseOrigin::ForwardError);
    assert_eq!(down.status(), 502);
    assert_eq!(failed.origin(), ResponseOrigin::Injected);
    assert_eq!(failed.status(), 503);
    assert_eq!(unclaimed.origin(), ResponseOrigin::ForwardError);
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn in_flight_requests_finish_after_clear() {
    let upstream = StaticUpstream::ok();
    let interceptor = RequestInterceptor::builder().build(upstream.clone());
    interceptor
        .registry()
        .register("**/api/**", profile(2_000, (0, 0), 0.0))
        .expect("register");

    let started = Instant::now();
    let in_flight = interceptor.spawn(InterceptedRequest::get("/api/slow"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    interceptor.registry().clear("**/api/**").expect("clear");

    let (origin, elapsed) = timed(&interceptor, "/api/after").await;
    assert_eq!(origin, ResponseOrigin::Upstream);
    assert_eq!(elapsed, Duration::ZERO);

    interceptor.drain().await;
    let response = in_flight.await.expect("joined").expect("not aborted");
    assert_eq!(response.origin(), ResponseOrigin::Upstream);
    assert_eq!(started.elapsed(), Duration::from_millis(2_000));
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn handler_delay_then_forward() {
    let upstream = StaticUpstream::ok();
    let interceptor = RequestInterceptor::builder().build(upstream.clone());
    interceptor
        .registry()
        .register_handler(
            "**/api/**",
            FnHandler::shared("writes-slow", |req| {
                if req.method() == "POST" {
                    HandlerDecision::ContinueAfter(Duration::from_millis(750))
                } else {
                    HandlerDecision::Continue
                }
            }),
        )
        .expect("register");

    let started = Instant::now();
    interceptor
        .handle(InterceptedRequest::post("/api/payments", "{}"))
        .await
        .expect("forwarded");
    assert_eq!(started.elapsed(), Duration::from_millis(750));
    assert_eq!(upstream.requests()[0].method(), "POST");
}

#[tokio::test]
async fn handler_abort_is_an_engine_error() {
    let upstream = StaticUpstream::ok();
    let interceptor = RequestInterceptor::builder().build(upstream.clone());
    interceptor
        .registry()
        .register_handler(
            "**/admin/**",
            FnHandler::shared("deny", |_| HandlerDecision::Abort("blocked".into())),
        )
        .expect("register");

    let err = interceptor
        .handle(InterceptedRequest::get("/admin/users"))
        .await
        .expect_err("aborted");
    assert!(err.to_string().contains("blocked"));
    assert_eq!(upstream.calls(), 0);
}

#[traced_test]
#[tokio::test]
async fn panicking_handler_is_contained_and_logged() {
    let upstream = StaticUpstream::ok();
    let interceptor = RequestInterceptor::builder().build(upstream.clone());
    let registry = interceptor.registry();
    registry
        .register_handler(
            "**/fragile/**",
            FnHandler::shared("fragile", |_| -> HandlerDecision { panic!("handler exploded") }),
        )
        .expect("register");

    let err = interceptor
        .handle(InterceptedRequest::get("/fragile/1"))
        .await
        .expect_err("panic becomes an abort");
    assert!(err.to_string().contains("handler exploded"));
    assert!(logs_contain("route handler panicked"));

    let healthy = interceptor
        .handle(InterceptedRequest::get("/healthy"))
        .await
        .expect("interceptor keeps serving");
    assert!(healthy.is_success());
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn condition_layer_wraps_any_service() {
    let registry = Arc::new(InterceptorRegistry::new());
    registry
        .register("**", profile(250, (0, 0), 0.0))
        .expect("register");
    let layer = ConditionLayer::new(
        InterceptorBuilder::new()
            .registry(Arc::clone(&registry))
            .entropy(Entropy::seeded(1)),
    );
    let wrapped = layer.transform(StaticUpstream::ok()).await;

    let started = Instant::now();
    let response = wrapped
        .call(InterceptedRequest::get("/any"))
        .await
        .expect("not aborted");
    assert!(response.is_success());
    assert_eq!(started.elapsed(), Duration::from_millis(250));
}
