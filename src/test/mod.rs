
mod method_stub;
