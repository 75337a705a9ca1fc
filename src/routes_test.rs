use super::*;

#[test]
fn login_is_the_only_public_route() {
    let public: Vec<_> = ROUTES.iter().filter(|r| !r.is_guarded()).map(|r| r.path).collect();
    assert_eq!(public, vec![LOGIN_PATH]);
}

#[test]
fn paths_are_unique() {
    let mut paths: Vec<_> = ROUTES.iter().map(|r| r.path).collect();
    paths.sort_unstable();
    paths.dedup();
    assert_eq!(paths.len(), ROUTES.len());
}

#[test]
fn admin_pages_require_administrador() {
    for path in ["/admin", "/logs"] {
        assert_eq!(find(path).unwrap().access, Access::Roles(&[ADMINISTRADOR]));
    }
}

#[test]
fn every_form_and_report_is_operator_only() {
    for kind in FormKind::ALL {
        for path in [kind.form_route(), kind.report_route()] {
            let route = find(path).unwrap_or_else(|| panic!("missing route {path}"));
            assert_eq!(route.access.roles(), &[OPERADOR]);
        }
    }
}

#[test]
fn home_and_profile_need_any_session() {
    assert_eq!(find(HOME_PATH).unwrap().access, Access::Authenticated);
    assert_eq!(find("/profile").unwrap().access.roles(), &[] as &[&str]);
}

#[test]
fn find_ignores_trailing_slash() {
    assert_eq!(find("/admin/").unwrap().path, "/admin");
    assert!(find("/").is_none());
    assert!(find("/forms").is_none());
}

#[test]
fn recording_navigator_keeps_history() {
    let nav = RecordingNavigator::new();
    assert!(nav.last().is_none());
    nav.navigate(LOGIN_PATH);
    nav.navigate(HOME_PATH);
    assert_eq!(nav.visited(), vec![LOGIN_PATH, HOME_PATH]);
    assert_eq!(nav.last().as_deref(), Some(HOME_PATH));
}
