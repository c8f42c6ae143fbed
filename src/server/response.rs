use may_minihttp::Response;

use crate::dispatch::ResponseHandle;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Copy a finished [`ResponseHandle`] onto the wire response.
pub fn write_response(res: &mut Response, handle: ResponseHandle) {
    let (status, headers, body) = handle.into_parts();
    res.status_code(status as usize, status_reason(status));
    for (name, value) in headers {
        let header = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(header));
    }
    res.body_vec(body);
}
