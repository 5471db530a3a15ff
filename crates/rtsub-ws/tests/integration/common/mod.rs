pub mod mock_appsync;
