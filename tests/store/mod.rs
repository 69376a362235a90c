mod concurrency_test;
mod scenario_test;
