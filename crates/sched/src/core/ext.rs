/// Last path segment of a type name, without generic arguments.
///
/// Closures keep their enclosing item so `app::setup::{{closure}}` reads as
/// `setup::{{closure}}` instead of a bare `{{closure}}`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let name = std::any::type_name::<T>();
    let path = name.split('<').next().unwrap_or(name);

    let mut segments = path.rmatch_indices("::").map(|(index, _)| index);
    let start = match (segments.next(), path.ends_with("{{closure}}")) {
        (Some(_), true) => segments.next().map_or(0, |index| index + 2),
        (Some(index), false) => index + 2,
        (None, _) => 0,
    };

    &path[start..]
}
