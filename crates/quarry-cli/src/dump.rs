//! `quarry dump`: print what population recorded, relation by relation.

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::Path;

use quarry_pkb::{NameId, OneToManyStore, ReadFacade, StmtNo};
use quarry_qps::Session;

pub fn cmd_dump(source: &Path, relation: Option<&str>) -> Result<()> {
    let session = Session::from_file(source)?;
    let read = session.pkb().read();

    match relation {
        None => {
            entities(&read);
            follows(&read);
            parent(&read);
            calls(&read);
            next(&read);
            affects(&read);
            modifies(&read);
            uses(&read);
        }
        Some("entities") => entities(&read),
        Some("follows") => follows(&read),
        Some("parent") => parent(&read),
        Some("calls") => calls(&read),
        Some("next") => next(&read),
        Some("affects") => affects(&read),
        Some("modifies") => modifies(&read),
        Some("uses") => uses(&read),
        Some(other) => bail!(
            "unknown relation `{other}` (expected follows, parent, calls, next, \
             affects, modifies, uses, entities)"
        ),
    }

    Ok(())
}

fn entities(read: &ReadFacade<'_>) {
    let ents = read.entities();
    let name = |raw: u32| read.name_of(NameId::new(raw)).unwrap_or_default();

    println!("{}", "procedures".bold());
    for raw in ents.procedures().iter() {
        match ents.proc_range(NameId::new(raw)) {
            Some((first, last)) => println!("  {} [{first}..{last}]", name(raw)),
            None => println!("  {}", name(raw)),
        }
    }

    println!("{}", "variables".bold());
    for raw in ents.variables().iter() {
        println!("  {}", name(raw));
    }

    println!("{}", "constants".bold());
    for raw in ents.constants().iter() {
        println!("  {}", name(raw));
    }

    println!("{}", "statements".bold());
    for number in 1..=ents.stmt_count() {
        let Some(ty) = ents.stmt_type(number) else {
            continue;
        };
        match ents.attr_of(number).and_then(|id| read.name_of(id)) {
            Some(attr) => println!("  {number}: {} {attr}", ty.keyword()),
            None => println!("  {number}: {}", ty.keyword()),
        }
    }
}

fn follows(read: &ReadFacade<'_>) {
    stmt_relation("Follows", read.follows().rel().base());
    stmt_relation("Follows*", read.follows().rel().star());
}

fn parent(read: &ReadFacade<'_>) {
    stmt_relation("Parent", read.parent().rel().base());
    stmt_relation("Parent*", read.parent().rel().star());
}

fn next(read: &ReadFacade<'_>) {
    stmt_relation("Next", read.next().rel().base());
    stmt_relation("Next*", read.next().rel().star());
}

fn affects(read: &ReadFacade<'_>) {
    stmt_relation("Affects", read.affects().pairs());
}

fn calls(read: &ReadFacade<'_>) {
    let name = |id: NameId| read.name_of(id).unwrap_or_default();
    let sides = [
        ("Calls", read.calls().rel().base()),
        ("Calls*", read.calls().rel().star()),
    ];
    for (title, store) in sides {
        println!("{} ({} pairs)", title.bold(), store.len());
        for caller in store.keys() {
            let callees: Vec<String> = store.values_of(caller).map(name).collect();
            println!("  {} -> {}", name(caller), callees.join(" "));
        }
    }
}

fn modifies(read: &ReadFacade<'_>) {
    data_access(
        "Modifies",
        read,
        read.modifies().stmts(),
        read.modifies().procs(),
    );
}

fn uses(read: &ReadFacade<'_>) {
    data_access("Uses", read, read.uses().stmts(), read.uses().procs());
}

fn stmt_relation(title: &str, store: &OneToManyStore<StmtNo, StmtNo>) {
    println!("{} ({} pairs)", title.bold(), store.len());
    for key in store.keys() {
        let values: Vec<String> = store.values_of(key).map(|v| v.to_string()).collect();
        println!("  {key} -> {}", values.join(" "));
    }
}

fn data_access(
    title: &str,
    read: &ReadFacade<'_>,
    stmts: &OneToManyStore<StmtNo, NameId>,
    procs: &OneToManyStore<NameId, NameId>,
) {
    println!(
        "{} ({} stmt pairs, {} proc pairs)",
        title.bold(),
        stmts.len(),
        procs.len()
    );
    for stmt in stmts.keys() {
        let vars: Vec<String> = stmts.values_of(stmt).filter_map(|v| read.name_of(v)).collect();
        println!("  {stmt} -> {}", vars.join(" "));
    }
    for proc in procs.keys() {
        let vars: Vec<String> = procs.values_of(proc).filter_map(|v| read.name_of(v)).collect();
        println!(
            "  {} -> {}",
            read.name_of(proc).unwrap_or_default(),
            vars.join(" ")
        );
    }
}
