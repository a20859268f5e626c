// test-utils: shared test helpers for the gateway's integration suite.

pub mod mock_ws_client;

pub use mock_ws_client::MockWsClient;
