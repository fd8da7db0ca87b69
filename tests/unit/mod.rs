mod support;

mod book_property_tests;
mod gateway_tests;
