use staticd::request::{parse, validate, Method, ParseError, ValidateError};

#[test]
fn test_parse_get_with_headers() {
    let raw = parse(b"GET /index.html HTTP/1.0\r\nHost: x\r\n\r\n").unwrap();

    assert_eq!(raw.method, "GET");
    assert_eq!(raw.path, "/index.html");
    assert_eq!(raw.minor_version, 0);
    assert_eq!(raw.headers, vec![("Host".to_string(), "x".to_string())]);
}

#[test]
fn test_validate_accepts_each_supported_method() {
    for (line, method) in [
        (&b"GET / HTTP/1.0\r\n\r\n"[..], Method::GET),
        (&b"HEAD / HTTP/1.0\r\n\r\n"[..], Method::HEAD),
        (&b"POST / HTTP/1.0\r\n\r\n"[..], Method::POST),
    ] {
        let req = validate(parse(line).unwrap()).unwrap();
        assert_eq!(req.method, method);
        assert_eq!(req.path, "/");
    }
}

#[test]
fn test_headers_keep_order_duplicates_and_case() {
    let raw = parse(
        b"GET / HTTP/1.0\r\n\
          X-One: first\r\n\
          x-one: second\r\n\
          Host: example\r\n\r\n",
    )
    .unwrap();

    let expected = [("X-One", "first"), ("x-one", "second"), ("Host", "example")];
    assert_eq!(raw.headers.len(), expected.len());
    for ((name, value), (want_name, want_value)) in raw.headers.iter().zip(expected) {
        assert_eq!(name, want_name);
        assert_eq!(value, want_value);
    }
}

#[test]
fn test_http_1_1_is_rejected() {
    let raw = parse(b"GET /a HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(raw.minor_version, 1);
    assert_eq!(
        validate(raw).unwrap_err(),
        ValidateError::UnsupportedVersion
    );
}

#[test]
fn test_unknown_method_is_rejected() {
    let raw = parse(b"DELETE /a HTTP/1.0\r\n\r\n").unwrap();
    assert_eq!(validate(raw).unwrap_err(), ValidateError::UnknownMethod);
}

#[test]
fn test_two_token_request_line_is_malformed() {
    assert_eq!(parse(b"GET /a\r\n\r\n").unwrap_err(), ParseError);
}

#[test]
fn test_four_token_request_line_is_malformed() {
    assert_eq!(parse(b"GET /a HTTP/1.0 extra\r\n\r\n").unwrap_err(), ParseError);
}

#[test]
fn test_empty_input_is_malformed() {
    assert_eq!(parse(b"").unwrap_err(), ParseError);
    assert_eq!(parse(b"\r\n\r\n").unwrap_err(), ParseError);
}

#[test]
fn test_non_http_version_token_is_malformed() {
    assert_eq!(parse(b"GET /a FTP/1.0\r\n\r\n").unwrap_err(), ParseError);
}
