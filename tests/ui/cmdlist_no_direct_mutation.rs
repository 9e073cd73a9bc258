// CmdList exposes no way to append tokens except the validating `add`
// method — this must fail to compile, not fail at runtime.
use procrun::cmdlist::CmdList;

fn main() {
    let mut c = CmdList::new();
    c.extend(vec!["a".to_string()]);
}
