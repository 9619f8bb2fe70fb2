mod switch;
mod machine;
mod lab;
