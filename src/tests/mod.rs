//! Integration-style tests for the binary: argument parsing and whole-widget
//! behavior driven through the public library API.

mod widget_tests;
