mod chat_flow_test;
mod common;
mod presence_redis_test;
mod routes_test;
mod signaling_test;
