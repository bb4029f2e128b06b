//! Inherited, isolated and destroyed scopes in one tree

use dirtyscope::Scope;

fn main() {
    println!("=== Scope Tree ===\n");

    let root = Scope::new();
    root.set("user", "Jane");

    let child = root.new_child();
    let isolated = root.new_isolated_child();
    let grandchild = child.new_child();

    println!("child sees user:       {}", child.get("user"));
    println!("isolated sees user:    {}", isolated.get("user"));
    println!("grandchild sees user:  {}", grandchild.get("user"));

    grandchild.watch(
        |s| s.get("user"),
        |new, _, s| println!("   [grandchild {}] user is {}", s.id(), new),
    );
    isolated.watch(
        |s| s.get("user"),
        |new, _, s| println!("   [isolated {}] user is {}", s.id(), new),
    );

    println!("\nDigest from the root:");
    root.digest().unwrap();

    println!("\nRename, then digest from the grandchild (whole tree runs):");
    root.set("user", "Bob");
    isolated.set("user", "Ada");
    grandchild.digest().unwrap();

    println!("\nDestroy the child; its subtree no longer runs:");
    child.destroy();
    root.set("user", "Eve");
    root.digest().unwrap();
    println!("root has {} child(ren)", root.children().len());
}
